// Change filter and diff engine: which attributes of an entity get forwarded

mod diff;
mod policy;

pub use diff::{changed_attributes, diff, numeric_projection, PointBuilder, NUMERIC_SUFFIX};
pub use policy::{Policy, PolicyMode, Selection, ALL_TOKEN};

#[cfg(test)]
mod tests;
