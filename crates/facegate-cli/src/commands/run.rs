use std::any::Any;
use std::process::ExitCode;

use crate::cli::{EnrollArgs, OutputMode, VerifyArgs};
use crate::commands::CommandHandler;
use crate::errors::AppResult;
use crate::identities::{self, EnrollOutcome, VerifyOutcome};
use crate::output::{render_enroll, render_verify};

type RunFn<A, O> = Box<dyn Fn(&A) -> AppResult<O> + Send + Sync>;
type RenderFn<O> = Box<dyn Fn(&O, OutputMode, bool) -> AppResult<()> + Send + Sync>;

/// Runs one embedding-file command, then renders its outcome. Both steps are
/// injectable so handlers can be exercised without a store on disk.
pub struct RunHandler<A, O> {
    args: A,
    run: RunFn<A, O>,
    render: RenderFn<O>,
}

pub type EnrollHandler = RunHandler<EnrollArgs, EnrollOutcome>;

/// A probe that does not clear the threshold still renders and exits 0.
pub type VerifyHandler = RunHandler<VerifyArgs, VerifyOutcome>;

impl<A, O> RunHandler<A, O> {
    pub fn with_dependencies(
        args: A,
        run: impl Fn(&A) -> AppResult<O> + Send + Sync + 'static,
        render: impl Fn(&O, OutputMode, bool) -> AppResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            args,
            run: Box::new(run),
            render: Box::new(render),
        }
    }
}

impl RunHandler<EnrollArgs, EnrollOutcome> {
    pub fn new(args: EnrollArgs) -> Self {
        Self::with_dependencies(args, identities::run_enroll, render_enroll)
    }
}

impl RunHandler<VerifyArgs, VerifyOutcome> {
    pub fn new(args: VerifyArgs) -> Self {
        Self::with_dependencies(args, identities::run_verify, render_verify)
    }
}

impl<A, O> CommandHandler for RunHandler<A, O>
where
    A: Send + Sync + 'static,
    O: 'static,
{
    fn execute(&self, mode: OutputMode, verbose: bool) -> AppResult<ExitCode> {
        let outcome = (self.run)(&self.args)?;
        (self.render)(&outcome, mode, verbose)?;
        Ok(ExitCode::SUCCESS)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
