//! `sitectl build | rollback | promote | releases | recover`

use clap::Args;
use sitectl_engine::EngineCommand;

#[derive(Debug, Args)]
pub struct TargetArgs {
    pub website: String,
    pub environment: String,
}

#[derive(Debug, Args)]
pub struct PromoteArgs {
    pub website: String,
    /// Environment whose active release is copied
    pub from: String,
    /// Environment that receives it
    pub to: String,
}

pub fn build(args: TargetArgs) -> EngineCommand {
    EngineCommand::Build {
        website: args.website,
        environment: args.environment,
    }
}

pub fn rollback(args: TargetArgs) -> EngineCommand {
    EngineCommand::Rollback {
        website: args.website,
        environment: args.environment,
    }
}

pub fn promote(args: PromoteArgs) -> EngineCommand {
    EngineCommand::Promote {
        website: args.website,
        source_env: args.from,
        target_env: args.to,
    }
}

pub fn releases(args: TargetArgs) -> EngineCommand {
    EngineCommand::Releases {
        website: args.website,
        environment: args.environment,
    }
}

pub fn recover() -> EngineCommand {
    EngineCommand::Recover
}
