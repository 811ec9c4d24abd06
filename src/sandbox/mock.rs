//! Recording mock function.
//!
//! A `MockFn` keeps every call's arguments and result in explicit fields and
//! changes behavior only through a fixed set of setters.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::suite::TestFailure;

type Implementation<A, R> = Arc<dyn Fn(&A) -> Result<R, TestFailure> + Send + Sync>;

enum Behavior<A, R> {
    /// Return `R::default()`.
    Default,
    Returns(R),
    Throws(String),
    Implementation(Implementation<A, R>),
}

struct State<A, R> {
    calls: Vec<A>,
    return_values: Vec<R>,
    exceptions: Vec<Option<TestFailure>>,
    behavior: Behavior<A, R>,
}

impl<A, R> State<A, R> {
    fn new() -> Self {
        Self {
            calls: Vec::new(),
            return_values: Vec::new(),
            exceptions: Vec::new(),
            behavior: Behavior::Default,
        }
    }
}

/// Mock callable taking `A` and returning `R`. Clones share state.
pub struct MockFn<A, R> {
    state: Arc<Mutex<State<A, R>>>,
}

impl<A, R> Clone for MockFn<A, R> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<A, R> Default for MockFn<A, R> {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::new())),
        }
    }
}

impl<A, R> MockFn<A, R>
where
    A: Clone,
    R: Clone + Default,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock that wraps `f`, recording calls while delegating behavior.
    pub fn spy<F>(f: F) -> Self
    where
        F: Fn(&A) -> R + Send + Sync + 'static,
    {
        let mock = Self::new();
        mock.implementation(move |args| Ok(f(args)));
        mock
    }

    /// Invoke the mock. The call is recorded whether it returns or throws.
    pub fn call(&self, args: A) -> Result<R, TestFailure> {
        let implementation = {
            let state = self.state.lock();
            match &state.behavior {
                Behavior::Implementation(f) => Some(Arc::clone(f)),
                _ => None,
            }
        };
        // Implementations run outside the lock so they may call the mock.
        let result = match implementation {
            Some(f) => f(&args),
            None => match &self.state.lock().behavior {
                Behavior::Returns(value) => Ok(value.clone()),
                Behavior::Throws(message) => Err(TestFailure::new(message.clone())),
                _ => Ok(R::default()),
            },
        };
        let mut state = self.state.lock();
        state.calls.push(args);
        match &result {
            Ok(value) => {
                state.return_values.push(value.clone());
                state.exceptions.push(None);
            }
            Err(e) => {
                state.return_values.push(R::default());
                state.exceptions.push(Some(e.clone()));
            }
        }
        result
    }

    pub fn returns(&self, value: R) -> &Self {
        self.state.lock().behavior = Behavior::Returns(value);
        self
    }

    pub fn throws(&self, message: impl Into<String>) -> &Self {
        self.state.lock().behavior = Behavior::Throws(message.into());
        self
    }

    pub fn implementation<F>(&self, f: F) -> &Self
    where
        F: Fn(&A) -> Result<R, TestFailure> + Send + Sync + 'static,
    {
        self.state.lock().behavior = Behavior::Implementation(Arc::new(f));
        self
    }

    /// Clear recorded calls and restore the default behavior.
    pub fn reset(&self) -> &Self {
        *self.state.lock() = State::new();
        self
    }

    pub fn calls(&self) -> Vec<A> {
        self.state.lock().calls.clone()
    }

    pub fn return_values(&self) -> Vec<R> {
        self.state.lock().return_values.clone()
    }

    pub fn exceptions(&self) -> Vec<Option<TestFailure>> {
        self.state.lock().exceptions.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }

    pub fn called(&self) -> bool {
        self.call_count() > 0
    }
}

impl<A, R> fmt::Debug for MockFn<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MockFn")
            .field("calls", &state.calls.len())
            .finish_non_exhaustive()
    }
}
