//! Container codec over the tag tree format.
//!
//! # Responsibility
//! - Turn a parsed tag tree into a `Container` (shape inference, owner-name
//!   resolution, slot clamping).
//! - Build empty containers with the same owner-name rules.
//! - Encode containers back into tag trees.
//!
//! # Invariants
//! - Decoding never yields a slot outside the container capacity.
//! - The public key is always reported as case-correct.

mod container_decoder;
mod container_encoder;
mod item_stack;

pub use container_decoder::{
    infer_rows, ContainerDecoder, DEFAULT_ITEMS_TAG, DEFAULT_PUBLIC_KEY_NAME,
};
pub use container_encoder::encode_container;
