use std::collections::HashMap;
use std::fmt;

use super::{OperationResult, OperationValue, failure};
use crate::error::ErrorKind;
use crate::op::{FileSystemOperation, OperationTag};

type Handler = Box<dyn Fn(Box<dyn OperationValue>) -> OperationResult + Send + Sync>;

/// Terminal pipeline stage: one handler per operation tag.
///
/// The table is fixed once built. A tag without a handler fails with
/// `NotImplemented` instead of failing construction.
pub struct Executor {
    handlers: HashMap<OperationTag, Handler>,
}

impl Executor {
    pub fn builder() -> ExecutorBuilder {
        ExecutorBuilder::default()
    }

    pub fn is_supported(&self, tag: OperationTag) -> bool {
        self.handlers.contains_key(&tag)
    }

    pub(crate) fn execute(
        &self,
        tag: OperationTag,
        input: Box<dyn OperationValue>,
    ) -> OperationResult {
        match self.handlers.get(&tag) {
            Some(handler) => handler(input),
            None => Err(failure(
                ErrorKind::NotImplemented,
                format!("Operation `{tag}` is not implemented"),
            )),
        }
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<_> = self.handlers.keys().collect();
        tags.sort();
        f.debug_struct("Executor").field("handlers", &tags).finish()
    }
}

#[derive(Default)]
pub struct ExecutorBuilder {
    handlers: HashMap<OperationTag, Handler>,
}

impl ExecutorBuilder {
    /// Registers the handler of `Op`, replacing any previous one.
    pub fn register<Op, F>(mut self, handler: F) -> Self
    where
        Op: FileSystemOperation,
        F: Fn(Op::Input) -> Result<Op::Output, Op::Error> + Send + Sync + 'static,
    {
        self.add::<Op, F>(handler);
        self
    }

    pub fn add<Op, F>(&mut self, handler: F) -> &mut Self
    where
        Op: FileSystemOperation,
        F: Fn(Op::Input) -> Result<Op::Output, Op::Error> + Send + Sync + 'static,
    {
        let erased: Handler = Box::new(move |input: Box<dyn OperationValue>| {
            let input = match input.into_any().downcast::<Op::Input>() {
                Ok(input) => *input,
                Err(_) => panic!("input of `{}` was replaced with a value of another type", Op::TAG),
            };
            match handler(input) {
                Ok(output) => Ok(Box::new(output) as Box<dyn OperationValue>),
                Err(err) => Err(Box::new(err) as Box<dyn super::OperationFailure>),
            }
        });
        self.handlers.insert(Op::TAG, erased);
        self
    }

    pub fn build(self) -> Executor {
        Executor {
            handlers: self.handlers,
        }
    }
}
