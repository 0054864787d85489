use std::any::Any;
use std::process::ExitCode;

use crate::cli::{Commands, OutputMode};
use crate::errors::AppResult;

pub trait CommandHandler: Send + Sync {
    fn execute(&self, mode: OutputMode, verbose: bool) -> AppResult<ExitCode>;
    fn as_any(&self) -> &dyn Any;
}

mod run;
mod store;

pub use run::{EnrollHandler, RunHandler, VerifyHandler};
pub use store::{StoreCommand, StoreHandler, StoreHandlerDeps};

impl From<Commands> for Box<dyn CommandHandler> {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Enroll(args) => Box::new(EnrollHandler::new(args)),
            Commands::Verify(args) => Box::new(VerifyHandler::new(args)),
            Commands::List(args) => Box::new(StoreHandler::new(StoreCommand::List(args))),
            Commands::Remove(args) => Box::new(StoreHandler::new(StoreCommand::Remove(args))),
            Commands::Clear(args) => Box::new(StoreHandler::new(StoreCommand::Clear(args))),
            Commands::Status(args) => Box::new(StoreHandler::new(StoreCommand::Status(args))),
        }
    }
}
