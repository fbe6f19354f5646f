//! A closure based task type.
//!
//! Programs embedding the runtime usually bring their own task type (e.g. the
//! values of an interpreter). `Job` is a small stand-in for cases where all
//! that's needed is running Rust closures: it has a handful of data variants
//! to pass values around, functions, and calls binding a function to an
//! argument.
use crate::task::Task;
use std::fmt;
use std::sync::Arc;

/// The type of functions wrapped by a `Job`.
pub type Function = Arc<dyn Fn(Job) -> Job + Send + Sync>;

#[derive(Clone)]
pub enum Job {
    Nil,
    Int(i64),
    Text(Arc<str>),
    List(Arc<Vec<Job>>),
    Func(Function),

    /// A function (or another call producing a function) and its argument.
    Call(Box<Job>, Box<Job>),
}

impl Job {
    pub fn func<F>(function: F) -> Job
    where
        F: Fn(Job) -> Job + Send + Sync + 'static,
    {
        Job::Func(Arc::new(function))
    }

    /// Returns a function that ignores its argument and returns `Nil`.
    pub fn thunk<F>(function: F) -> Job
    where
        F: Fn() + Send + Sync + 'static,
    {
        Job::func(move |_| {
            function();
            Job::Nil
        })
    }

    pub fn text(value: &str) -> Job {
        Job::Text(Arc::from(value))
    }

    pub fn list(values: Vec<Job>) -> Job {
        Job::List(Arc::new(values))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Job::Nil)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Job::Int(val) => Some(*val),
            _ => None,
        }
    }

    /// Returns `true` if both values are the same object.
    ///
    /// Values without a heap allocation (`Nil` and `Int`) are compared by
    /// value, as there's no identity to compare.
    pub fn same(&self, other: &Job) -> bool {
        match (self, other) {
            (Job::Text(a), Job::Text(b)) => Arc::ptr_eq(a, b),
            (Job::List(a), Job::List(b)) => Arc::ptr_eq(a, b),
            (Job::Func(a), Job::Func(b)) => same_function(a, b),
            (Job::Call(af, aa), Job::Call(bf, ba)) => {
                af.same(bf) && aa.same(ba)
            }
            (Job::Nil, Job::Nil) => true,
            (Job::Int(a), Job::Int(b)) => a == b,
            _ => false,
        }
    }
}

fn same_function(a: &Function, b: &Function) -> bool {
    // Comparing the fat pointers would also compare the vtables, which may
    // differ for the same closure across codegen units.
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

impl Task for Job {
    fn apply(self) -> Job {
        match self {
            Job::Func(function) => function(Job::Nil),
            Job::Call(function, argument) => {
                let callee = match *function {
                    call @ Job::Call(..) => call.apply(),
                    other => other,
                };

                match callee {
                    Job::Func(function) => function(*argument),
                    other => other,
                }
            }
            value => value,
        }
    }

    fn deep_copy(&self) -> Job {
        match self {
            Job::Nil => Job::Nil,
            Job::Int(val) => Job::Int(*val),
            Job::Text(val) => Job::Text(Arc::from(&**val)),
            Job::List(vals) => {
                Job::List(Arc::new(vals.iter().map(Job::deep_copy).collect()))
            }
            // Functions are immutable, so sharing them is fine.
            Job::Func(function) => Job::Func(function.clone()),
            Job::Call(function, argument) => Job::Call(
                Box::new(function.deep_copy()),
                Box::new(argument.deep_copy()),
            ),
        }
    }

    fn equals(&self, other: &Job) -> bool {
        match (self, other) {
            (Job::Nil, Job::Nil) => true,
            (Job::Int(a), Job::Int(b)) => a == b,
            (Job::Text(a), Job::Text(b)) => a == b,
            (Job::List(a), Job::List(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b.iter()).all(|(a, b)| a.equals(b))
            }
            (Job::Func(a), Job::Func(b)) => same_function(a, b),
            (Job::Call(af, aa), Job::Call(bf, ba)) => {
                af.equals(bf) && aa.equals(ba)
            }
            _ => false,
        }
    }

    fn bind(self, argument: Job) -> Job {
        Job::Call(Box::new(self), Box::new(argument))
    }

    fn noop() -> Job {
        Job::Nil
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Job::Nil => write!(f, "Nil"),
            Job::Int(val) => write!(f, "Int({})", val),
            Job::Text(val) => write!(f, "Text({:?})", val),
            Job::List(vals) => f.debug_tuple("List").field(&**vals).finish(),
            Job::Func(function) => {
                write!(f, "Func({:p})", Arc::as_ptr(function) as *const ())
            }
            Job::Call(function, argument) => {
                f.debug_tuple("Call").field(function).field(argument).finish()
            }
        }
    }
}
