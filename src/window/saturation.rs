use crate::crawler::PageResult;

/// Decides whether a window's result set is fully enumerable
///
/// The remote API stops paginating after a fixed number of results per query.
/// A window whose page-0 metadata reaches either ceiling is treated as
/// truncated and has to be split. Hitting a ceiling exactly counts as saturated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaturationDetector {
    max_found: u64,
    max_pages: u32,
}

impl SaturationDetector {
    pub fn new(max_found: u64, max_pages: u32) -> Self {
        Self {
            max_found,
            max_pages,
        }
    }

    pub fn is_saturated(&self, result: &PageResult) -> bool {
        result.found >= self.max_found || result.pages >= self.max_pages
    }

    pub fn max_found(&self) -> u64 {
        self.max_found
    }

    pub fn max_pages(&self) -> u32 {
        self.max_pages
    }
}
