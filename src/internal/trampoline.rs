//! Stack-safe recursion
//!
//! A [`Trampoline`] expresses a recursive computation as a chain of steps.
//! Each step is either [`Complete`](Trampoline::Complete), holding the final
//! result, or [`Intermediate`](Trampoline::Intermediate), holding a deferred
//! closure that produces the next step. [`compute_result`] drives the chain
//! from a single loop, so the depth of the logical recursion never shows up
//! on the call stack.
//!
//! Every traversal whose depth scales with the size of the input (walking
//! a [`PersistentList`](crate::PersistentList) or a
//! [`ParseGraph`](crate::ParseGraph)) is written as a function returning a
//! `Trampoline`, in which the recursive call is wrapped in
//! [`Trampoline::intermediate`] instead of being made directly.
//!
//! [`compute_result`]: Trampoline::compute_result

/// A single step of a trampolined computation producing a `T`.
pub enum Trampoline<'a, T> {
    /// The computation has finished with the held result.
    Complete(T),
    /// The computation continues with the step returned by the held closure.
    Intermediate(Box<dyn FnOnce() -> Trampoline<'a, T> + 'a>),
}

impl<'a, T> Trampoline<'a, T> {
    /// Constructs a finished step.
    #[inline]
    #[must_use]
    pub fn complete(result: T) -> Self {
        Self::Complete(result)
    }

    /// Constructs a deferred step.
    #[inline]
    #[must_use]
    pub fn intermediate<F>(next: F) -> Self
    where
        F: FnOnce() -> Trampoline<'a, T> + 'a,
    {
        Self::Intermediate(Box::new(next))
    }

    /// Returns `true` if this step holds the final result.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }

    /// Runs the chain of steps to completion and returns the final result.
    ///
    /// Call-stack usage is constant in the number of steps.
    pub fn compute_result(self) -> T {
        let mut step = self;
        loop {
            match step {
                Self::Complete(result) => return result,
                Self::Intermediate(next) => step = next(),
            }
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Trampoline<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Complete(result) => f.debug_tuple("Complete").field(result).finish(),
            Self::Intermediate(_) => f.write_str("Intermediate(..)"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn count_down(n: u64, acc: u64) -> Trampoline<'static, u64> {
        if n == 0 {
            Trampoline::complete(acc)
        } else {
            Trampoline::intermediate(move || count_down(n - 1, acc + n))
        }
    }

    #[test]
    fn deep_recursion_does_not_overflow() {
        assert_eq!(count_down(1_000_000, 0).compute_result(), 500_000_500_000);
    }

    #[test]
    fn borrows_from_environment() {
        let data = vec![1u32, 2, 3, 4];
        fn sum<'a>(rest: &'a [u32], acc: u32) -> Trampoline<'a, u32> {
            match rest.split_first() {
                None => Trampoline::complete(acc),
                Some((head, tail)) => Trampoline::intermediate(move || sum(tail, acc + head)),
            }
        }
        let step = sum(&data, 0);
        assert!(!step.is_complete());
        assert_eq!(step.compute_result(), 10);
    }
}
