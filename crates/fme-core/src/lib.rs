//! fme-core: parsing, tree reconstruction, and regeneration for Fusion
//! macro `.setting` files
//!
//! This crate focuses on a small, well-factored surface:
//! - Segmenting reader splitting macro text into verbatim regions plus the
//!   exposed-inputs and helper-metadata regions
//! - Arena control tree rebuilt from the flat declaration sequence using the
//!   helper's subtree sizes
//! - Pointer-addressed editing operations for UI layers
//! - Regenerator splicing the edited regions back between untouched text
//!
pub mod edit;
pub mod editor;
pub mod json;
pub mod macros;
pub mod setting;
pub mod setting_write;
pub mod tree;

// Re-export the parse/edit/regenerate surface
pub use edit::{
    add_page, add_separator, group_range, indent, move_node, node_by_pointer, outdent, pointer_of,
    remove, rename, ungroup,
};
pub use setting::{
    Diagnostics, FlatItem, MacroDocument, MetadataEntry, OperatorKind, PropValue, Segment,
    edited_file_name, parse_file, parse_macro,
};
pub use setting_write::{regenerate, write_edited_file};
