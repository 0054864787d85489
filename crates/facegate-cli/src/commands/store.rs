use std::any::Any;
use std::process::ExitCode;

use crate::cli::{OutputMode, RemoveArgs, StoreArgs};
use crate::commands::CommandHandler;
use crate::errors::AppResult;
use crate::identities::{self, ClearOutcome, ListOutcome, RemoveOutcome, StatusOutcome};
use crate::output::{render_clear, render_list, render_remove, render_status};

/// Commands that operate on the enrollment store without a probe.
#[derive(Debug, Clone)]
pub enum StoreCommand {
    List(StoreArgs),
    Remove(RemoveArgs),
    Clear(StoreArgs),
    Status(StoreArgs),
}

pub struct StoreHandler {
    command: StoreCommand,
    deps: StoreHandlerDeps,
}

pub struct StoreHandlerDeps {
    pub list: Box<dyn Fn(&StoreArgs) -> AppResult<ListOutcome> + Send + Sync>,
    pub remove: Box<dyn Fn(&RemoveArgs) -> AppResult<RemoveOutcome> + Send + Sync>,
    pub clear: Box<dyn Fn(&StoreArgs) -> AppResult<ClearOutcome> + Send + Sync>,
    pub status: Box<dyn Fn(&StoreArgs) -> AppResult<StatusOutcome> + Send + Sync>,
    pub render_list: Box<dyn Fn(&ListOutcome, OutputMode) -> AppResult<()> + Send + Sync>,
    pub render_remove: Box<dyn Fn(&RemoveOutcome, OutputMode) -> AppResult<()> + Send + Sync>,
    pub render_clear: Box<dyn Fn(&ClearOutcome, OutputMode) -> AppResult<()> + Send + Sync>,
    pub render_status: Box<dyn Fn(&StatusOutcome, OutputMode) -> AppResult<()> + Send + Sync>,
}

impl StoreHandlerDeps {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        list: impl Fn(&StoreArgs) -> AppResult<ListOutcome> + Send + Sync + 'static,
        remove: impl Fn(&RemoveArgs) -> AppResult<RemoveOutcome> + Send + Sync + 'static,
        clear: impl Fn(&StoreArgs) -> AppResult<ClearOutcome> + Send + Sync + 'static,
        status: impl Fn(&StoreArgs) -> AppResult<StatusOutcome> + Send + Sync + 'static,
        render_list: impl Fn(&ListOutcome, OutputMode) -> AppResult<()> + Send + Sync + 'static,
        render_remove: impl Fn(&RemoveOutcome, OutputMode) -> AppResult<()> + Send + Sync + 'static,
        render_clear: impl Fn(&ClearOutcome, OutputMode) -> AppResult<()> + Send + Sync + 'static,
        render_status: impl Fn(&StatusOutcome, OutputMode) -> AppResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            list: Box::new(list),
            remove: Box::new(remove),
            clear: Box::new(clear),
            status: Box::new(status),
            render_list: Box::new(render_list),
            render_remove: Box::new(render_remove),
            render_clear: Box::new(render_clear),
            render_status: Box::new(render_status),
        }
    }
}

impl Default for StoreHandlerDeps {
    fn default() -> Self {
        Self::new(
            identities::run_list,
            identities::run_remove,
            identities::run_clear,
            identities::run_status,
            render_list,
            render_remove,
            render_clear,
            render_status,
        )
    }
}

impl StoreHandler {
    pub fn new(command: StoreCommand) -> Self {
        Self {
            command,
            deps: StoreHandlerDeps::default(),
        }
    }

    pub fn with_dependencies(command: StoreCommand, deps: StoreHandlerDeps) -> Self {
        Self { command, deps }
    }
}

impl CommandHandler for StoreHandler {
    fn execute(&self, mode: OutputMode, _verbose: bool) -> AppResult<ExitCode> {
        match &self.command {
            StoreCommand::List(args) => {
                let outcome = (self.deps.list)(args)?;
                (self.deps.render_list)(&outcome, mode)?;
            }
            StoreCommand::Remove(args) => {
                let outcome = (self.deps.remove)(args)?;
                (self.deps.render_remove)(&outcome, mode)?;
            }
            StoreCommand::Clear(args) => {
                let outcome = (self.deps.clear)(args)?;
                (self.deps.render_clear)(&outcome, mode)?;
            }
            StoreCommand::Status(args) => {
                let outcome = (self.deps.status)(args)?;
                (self.deps.render_status)(&outcome, mode)?;
            }
        }
        Ok(ExitCode::SUCCESS)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
