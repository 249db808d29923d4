//! Chain-of-responsibility operation dispatch.
//!
//! An operation travels through the configured interceptors in order and
//! ends in the [`Executor`], which looks its handler up by [`OperationTag`].
//! Inputs, outputs and errors are type-erased while inside the chain and
//! restored at the typed entry point [`Pipeline::execute`].

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use wasi_hostfs_types::Errno;

use crate::error::{ErrorKind, FileSystemError, FileSystemOperationError};
use crate::op::{FileSystemOperation, OperationTag};

mod executor;
mod lock;
mod logging;

pub use executor::*;
pub use lock::*;
pub use logging::*;

/// A type-erased operation input or output.
pub trait OperationValue: Any + fmt::Debug + Send {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

impl<T: Any + fmt::Debug + Send> OperationValue for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

/// A type-erased operation error.
pub trait OperationFailure: fmt::Debug + fmt::Display + Send {
    fn error_kind(&self) -> ErrorKind;
    fn error_message(&self) -> &str;
    fn into_error_any(self: Box<Self>) -> Box<dyn Any + Send>;

    fn error_errno(&self) -> Errno {
        self.error_kind().errno()
    }
}

impl<E: FileSystemOperationError + fmt::Debug> OperationFailure for E {
    fn error_kind(&self) -> ErrorKind {
        self.kind()
    }

    fn error_message(&self) -> &str {
        self.message()
    }

    fn into_error_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

pub type OperationResult = Result<Box<dyn OperationValue>, Box<dyn OperationFailure>>;

/// Builds the failure an interceptor returns when it short-circuits.
pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Box<dyn OperationFailure> {
    Box::new(FileSystemError::new(kind, message))
}

/// A cross-cutting stage around every operation.
pub trait FileSystemInterceptor: Send + Sync + fmt::Debug {
    /// Either returns its own result or calls [`Chain::proceed`].
    fn intercept(&self, chain: Chain<'_>) -> OperationResult;
}

/// The rest of the pipeline as seen by an interceptor.
pub struct Chain<'a> {
    operation: OperationTag,
    input: Box<dyn OperationValue>,
    remaining: &'a [Arc<dyn FileSystemInterceptor>],
    executor: &'a Executor,
}

impl<'a> Chain<'a> {
    fn new(
        operation: OperationTag,
        input: Box<dyn OperationValue>,
        interceptors: &'a [Arc<dyn FileSystemInterceptor>],
        executor: &'a Executor,
    ) -> Self {
        Self {
            operation,
            input,
            remaining: interceptors,
            executor,
        }
    }

    pub fn operation(&self) -> OperationTag {
        self.operation
    }

    pub fn input(&self) -> &dyn fmt::Debug {
        &*self.input
    }

    /// Typed access to the input, e.g. to rewrite it before proceeding.
    pub fn input_mut<T: Any>(&mut self) -> Option<&mut T> {
        (*self.input).as_any_mut().downcast_mut::<T>()
    }

    /// Runs the next interceptor, or the executor after the last one.
    pub fn proceed(self) -> OperationResult {
        match self.remaining.split_first() {
            Some((next, rest)) => next.intercept(Chain {
                operation: self.operation,
                input: self.input,
                remaining: rest,
                executor: self.executor,
            }),
            None => self.executor.execute(self.operation, self.input),
        }
    }
}

/// Configured interceptors followed by the executor.
#[derive(Debug)]
pub struct Pipeline {
    interceptors: Vec<Arc<dyn FileSystemInterceptor>>,
    executor: Executor,
}

impl Pipeline {
    pub fn new(interceptors: Vec<Arc<dyn FileSystemInterceptor>>, executor: Executor) -> Self {
        Self {
            interceptors,
            executor,
        }
    }

    pub fn is_operation_supported(&self, tag: OperationTag) -> bool {
        self.executor.is_supported(tag)
    }

    pub fn execute<Op: FileSystemOperation>(
        &self,
        input: Op::Input,
    ) -> Result<Op::Output, Op::Error> {
        let chain = Chain::new(Op::TAG, Box::new(input), &self.interceptors, &self.executor);
        match chain.proceed() {
            Ok(output) => match output.into_any().downcast::<Op::Output>() {
                Ok(output) => Ok(*output),
                Err(_) => panic!("interceptor returned an output of the wrong type for `{}`", Op::TAG),
            },
            Err(failure) => Err(restore_error::<Op>(failure)),
        }
    }
}

fn restore_error<Op: FileSystemOperation>(failure: Box<dyn OperationFailure>) -> Op::Error {
    let kind = failure.error_kind();
    let message = failure.error_message().to_string();
    match failure.into_error_any().downcast::<Op::Error>() {
        Ok(error) => *error,
        Err(_) => Op::Error::from_kind(kind, message),
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::error::{CloseError, ReadLinkError};
    use crate::op::{Close, CloseInput, Readlink, ReadlinkInput};
    use crate::path::{BaseDirectory, VirtualPath};

    #[derive(Debug)]
    struct Recorder {
        name: &'static str,
        events: Arc<Mutex<Vec<String>>>,
    }

    impl FileSystemInterceptor for Recorder {
        fn intercept(&self, chain: Chain<'_>) -> OperationResult {
            self.events
                .lock()
                .push(format!("{} enter {}", self.name, chain.operation()));
            let result = chain.proceed();
            self.events.lock().push(format!("{} exit", self.name));
            result
        }
    }

    #[derive(Debug)]
    struct Deny;

    impl FileSystemInterceptor for Deny {
        fn intercept(&self, _chain: Chain<'_>) -> OperationResult {
            Err(failure(ErrorKind::NotCapable, "denied"))
        }
    }

    #[derive(Debug)]
    struct RewritePath;

    impl FileSystemInterceptor for RewritePath {
        fn intercept(&self, mut chain: Chain<'_>) -> OperationResult {
            if let Some(input) = chain.input_mut::<ReadlinkInput>() {
                input.path = VirtualPath::create("rewritten").unwrap();
            }
            chain.proceed()
        }
    }

    fn readlink_executor() -> Executor {
        Executor::builder()
            .register::<Readlink, _>(|input| Ok(input.path.to_string()))
            .build()
    }

    fn readlink_input() -> ReadlinkInput {
        ReadlinkInput {
            path: VirtualPath::create("link").unwrap(),
            base_directory: BaseDirectory::CurrentWorkingDirectory,
        }
    }

    #[test]
    fn interceptors_run_in_order_around_executor() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(
            vec![
                Arc::new(Recorder {
                    name: "outer",
                    events: events.clone(),
                }),
                Arc::new(Recorder {
                    name: "inner",
                    events: events.clone(),
                }),
            ],
            readlink_executor(),
        );
        let result = pipeline.execute::<Readlink>(readlink_input());
        assert_eq!(result, Ok("link".to_string()));
        assert_eq!(
            *events.lock(),
            vec![
                "outer enter readlink".to_string(),
                "inner enter readlink".to_string(),
                "inner exit".to_string(),
                "outer exit".to_string(),
            ]
        );
    }

    #[test]
    fn short_circuit_error_is_narrowed_to_operation_error() {
        let pipeline = Pipeline::new(vec![Arc::new(Deny)], readlink_executor());
        let result = pipeline.execute::<Readlink>(readlink_input());
        assert_eq!(result, Err(ReadLinkError::NotCapable("denied".to_string())));
    }

    #[test]
    fn interceptor_can_rewrite_input() {
        let pipeline = Pipeline::new(vec![Arc::new(RewritePath)], readlink_executor());
        let result = pipeline.execute::<Readlink>(readlink_input());
        assert_eq!(result, Ok("rewritten".to_string()));
    }

    #[test]
    fn missing_handler_is_not_implemented() {
        let pipeline = Pipeline::new(Vec::new(), readlink_executor());
        assert!(pipeline.is_operation_supported(OperationTag::Readlink));
        assert!(!pipeline.is_operation_supported(OperationTag::Close));

        let result = pipeline.execute::<Close>(CloseInput { fd: 5 });
        assert!(matches!(result, Err(CloseError::NotImplemented(_))));
        assert_eq!(result.unwrap_err().errno(), Errno::Notsup);
    }
}
