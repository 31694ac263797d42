//! Flattening of nested discovery results.

use crate::models::Nested;

/// Flatten an arbitrarily nested sequence, preserving left-to-right leaf order
///
/// Uses an explicit stack, so nesting depth is bounded only by memory.
pub fn flatten<T>(nested: Vec<Nested<T>>) -> Vec<T> {
    let mut stack: Vec<Nested<T>> = nested.into_iter().rev().collect();
    let mut flattened = Vec::with_capacity(stack.len());

    while let Some(item) = stack.pop() {
        match item {
            Nested::Leaf(value) => flattened.push(value),
            Nested::Branch(children) => stack.extend(children.into_iter().rev()),
        }
    }

    flattened
}
