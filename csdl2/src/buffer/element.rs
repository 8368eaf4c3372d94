// SPDX-FileCopyrightText: 2025 Contributors to the csdl2 project.
// SPDX-License-Identifier: Apache-2.0

//! Element descriptors for typed buffer views.

use csdl2_sys::{Color, Point, Rect};

/// Item size and struct-module format code of one view element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementLayout {
    pub item_size: usize,
    pub format: &'static str,
}

/// A plain-old-data element a [`crate::BufferView`] can be parameterised over.
///
/// # Safety
///
/// Implementors must be `#[repr(C)]` (or primitive) with no padding and no
/// invalid bit patterns, so any byte sequence of `LAYOUT.item_size` bytes is a
/// valid value.
pub unsafe trait Element: Copy + Send + Sync + 'static {
    const LAYOUT: ElementLayout;
}

unsafe impl Element for u8 {
    const LAYOUT: ElementLayout = ElementLayout {
        item_size: 1,
        format: "B",
    };
}

unsafe impl Element for i16 {
    const LAYOUT: ElementLayout = ElementLayout {
        item_size: 2,
        format: "h",
    };
}

unsafe impl Element for Color {
    const LAYOUT: ElementLayout = ElementLayout {
        item_size: 4,
        format: "BBBB",
    };
}

unsafe impl Element for Point {
    const LAYOUT: ElementLayout = ElementLayout {
        item_size: 8,
        format: "ii",
    };
}

unsafe impl Element for Rect {
    const LAYOUT: ElementLayout = ElementLayout {
        item_size: 16,
        format: "iiii",
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_layout<E: Element>() {
        assert_eq!(E::LAYOUT.item_size, std::mem::size_of::<E>());
    }

    #[test]
    fn layouts_match_type_sizes() {
        assert_layout::<u8>();
        assert_layout::<i16>();
        assert_layout::<Color>();
        assert_layout::<Point>();
        assert_layout::<Rect>();
    }
}
