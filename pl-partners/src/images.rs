//! Image order manager
//!
//! Position 0 of a partner's image list is its primary image. Reordering
//! only ever touches images that already have an address; files chosen but
//! not yet uploaded are appended after them at submit time.

use crate::error::{AppError, Result};
use pl_common::ImageRef;

/// Move the image at `from_index` to `target_index`
///
/// Elements between the two positions shift by one; all others keep their
/// relative order. Moving an index onto itself returns the list unchanged.
pub fn reorder(images: &[ImageRef], from_index: usize, target_index: usize) -> Result<Vec<ImageRef>> {
    let mut reordered = images.to_vec();
    move_image(&mut reordered, from_index, target_index)?;
    Ok(reordered)
}

/// Make the image at `index` the primary image
pub fn promote_to_primary(images: &[ImageRef], index: usize) -> Result<Vec<ImageRef>> {
    reorder(images, index, 0)
}

/// In-place form of [`reorder`]
pub fn move_image(images: &mut Vec<ImageRef>, from_index: usize, target_index: usize) -> Result<()> {
    let len = images.len();
    if from_index >= len || target_index >= len {
        return Err(AppError::InvalidInput(format!(
            "image index out of range (from {}, to {}, {} images)",
            from_index, target_index, len
        )));
    }
    if from_index != target_index {
        let image = images.remove(from_index);
        images.insert(target_index, image);
    }
    Ok(())
}
