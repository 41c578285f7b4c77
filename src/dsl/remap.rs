//! Maps diagnostic coordinates from the linked buffer back to the file the
//! user wrote, or to the standard library.

use super::error::Diagnostic;
use super::stdlib::{Boundary, STDLIB_FILENAME};

/// Rewrite filenames and coordinates in place.
///
/// Anything located before the boundary keeps its coordinates and is
/// attributed to the stdlib. Everything else is shifted back by the
/// preamble's byte length and line count. Columns never change. A fix is
/// only shifted when it lies in the user's region.
pub fn remap_diagnostics(diagnostics: &mut [Diagnostic], boundary: &Boundary, user_filename: &str) {
    for diag in diagnostics.iter_mut() {
        if boundary.contains_offset(diag.location.offset) {
            diag.filename = STDLIB_FILENAME.to_string();
        } else {
            diag.filename = user_filename.to_string();
            diag.location.line = diag.location.line.saturating_sub(boundary.line_count);
            diag.location.offset -= boundary.byte_len;
        }

        for rel in diag.related.iter_mut() {
            if boundary.contains_offset(rel.location.offset) {
                rel.filename = STDLIB_FILENAME.to_string();
            } else {
                rel.filename = user_filename.to_string();
                rel.location.line = rel.location.line.saturating_sub(boundary.line_count);
                rel.location.offset -= boundary.byte_len;
            }
        }

        if let Some(fix) = diag.fix.as_mut() {
            if !boundary.contains_offset(fix.location.offset) {
                fix.location.line = fix.location.line.saturating_sub(boundary.line_count);
                fix.location.offset -= boundary.byte_len;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::error::{codes, SourceLocation};

    const BOUNDARY: Boundary = Boundary {
        byte_len: 100,
        line_count: 5,
    };

    fn diag_at(line: u32, column: u32, offset: u32) -> Diagnostic {
        Diagnostic::error(
            codes::UNKNOWN_FUNCTION,
            "unknown function",
            "linked",
            SourceLocation::new(line, column, offset, 3),
        )
    }

    #[test]
    fn user_origin_is_shifted() {
        let mut diags = vec![diag_at(7, 4, 130)];
        remap_diagnostics(&mut diags, &BOUNDARY, "patch.akk");
        let d = &diags[0];
        assert_eq!(d.filename, "patch.akk");
        assert_eq!(d.location.line, 2);
        assert_eq!(d.location.column, 4);
        assert_eq!(d.location.offset, 30);
        assert_eq!(d.location.length, 3);
    }

    #[test]
    fn first_user_byte_maps_to_line_one_offset_zero() {
        let mut diags = vec![diag_at(6, 1, 100)];
        remap_diagnostics(&mut diags, &BOUNDARY, "patch.akk");
        assert_eq!(diags[0].location.line, 1);
        assert_eq!(diags[0].location.offset, 0);
    }

    #[test]
    fn stdlib_origin_is_untouched() {
        let mut diags = vec![diag_at(3, 9, 40)];
        remap_diagnostics(&mut diags, &BOUNDARY, "patch.akk");
        let d = &diags[0];
        assert_eq!(d.filename, STDLIB_FILENAME);
        assert_eq!((d.location.line, d.location.column, d.location.offset), (3, 9, 40));
    }

    #[test]
    fn related_notes_are_remapped_independently() {
        let mut diags = vec![diag_at(8, 1, 150)
            .with_related("previous definition", SourceLocation::new(4, 1, 60, 10))
            .with_related("also here", SourceLocation::new(6, 2, 101, 1))];
        remap_diagnostics(&mut diags, &BOUNDARY, "patch.akk");
        let rel = &diags[0].related;
        assert_eq!(rel[0].filename, STDLIB_FILENAME);
        assert_eq!(rel[0].location.line, 4);
        assert_eq!(rel[1].filename, "patch.akk");
        assert_eq!(rel[1].location.line, 1);
        assert_eq!(rel[1].location.offset, 1);
    }

    #[test]
    fn fix_in_stdlib_keeps_coordinates() {
        let mut diags = vec![
            diag_at(8, 1, 150).with_fix("rename", "x", SourceLocation::new(2, 1, 20, 1)),
            diag_at(8, 1, 150).with_fix("rename", "x", SourceLocation::new(8, 1, 150, 1)),
        ];
        remap_diagnostics(&mut diags, &BOUNDARY, "patch.akk");
        assert_eq!(diags[0].fix.as_ref().unwrap().location.offset, 20);
        assert_eq!(diags[1].fix.as_ref().unwrap().location.offset, 50);
        assert_eq!(diags[1].fix.as_ref().unwrap().location.line, 3);
    }
}
