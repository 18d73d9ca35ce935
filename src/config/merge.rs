//! Layer merging.
//!
//! Precedence from lowest to highest:
//! 1. the seed mapping
//! 2. each decoded file, in selection order
//! 3. overrides
//!
//! The merge is shallow. A colliding key takes the later value whole; nested
//! mappings are not combined.

use super::Mapping;

/// Merges decoded layers over an optional seed. Later layers win.
pub fn merge<I>(seed: Option<&Mapping>, layers: I) -> Mapping
where
    I: IntoIterator<Item = Mapping>,
{
    let base = seed.cloned().unwrap_or_default();
    layers.into_iter().fold(base, |mut acc, layer| {
        overlay(&mut acc, layer);
        acc
    })
}

/// Replaces or adds every top-level key of `layer` in `base`.
pub fn overlay(base: &mut Mapping, layer: Mapping) {
    for (key, value) in layer {
        base.insert(key, value);
    }
}
