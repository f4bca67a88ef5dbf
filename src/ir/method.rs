//! Method signature facts needed to seed parameter versions.

/// Static-ness and parameter layout of the method being analyzed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MethodDescriptor {
    /// `true` if the method has no `this` parameter
    pub is_static: bool,
    /// Stack size of each declared parameter (2 for `long`/`double`, 1 otherwise)
    pub param_sizes: Vec<u8>,
}

impl MethodDescriptor {
    /// Creates a descriptor from the static flag and the parameter sizes.
    #[must_use]
    pub fn new(is_static: bool, param_sizes: Vec<u8>) -> Self {
        MethodDescriptor {
            is_static,
            param_sizes,
        }
    }

    /// Local slots occupied by `this` (for instance methods) and every parameter,
    /// in declaration order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use jdssa::ir::MethodDescriptor;
    ///
    /// // instance method (long, int)
    /// let desc = MethodDescriptor::new(false, vec![2, 1]);
    /// assert_eq!(desc.param_slots(), vec![0, 1, 3]);
    /// ```
    #[must_use]
    pub fn param_slots(&self) -> Vec<i32> {
        let mut slots = Vec::with_capacity(self.param_sizes.len() + 1);
        let mut slot = 0i32;
        if !self.is_static {
            slots.push(slot);
            slot += 1;
        }
        for size in &self.param_sizes {
            slots.push(slot);
            slot += i32::from(*size);
        }
        slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_slots_skip_wide_halves() {
        let desc = MethodDescriptor::new(true, vec![1, 2, 2, 1]);
        assert_eq!(desc.param_slots(), vec![0, 1, 3, 5]);
    }

    #[test]
    fn test_instance_without_params() {
        let desc = MethodDescriptor::new(false, vec![]);
        assert_eq!(desc.param_slots(), vec![0]);
        assert!(MethodDescriptor::new(true, vec![]).param_slots().is_empty());
    }
}
