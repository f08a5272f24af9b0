use serde::Serialize;

#[derive(Debug, Default, Clone, Serialize, PartialEq, Eq)]
pub struct FilterStats {
    pub total: usize,
    pub kept: usize,
    pub ui_filtered: usize,
    pub blur_filtered: usize,
    pub duplicate_filtered: usize,
    pub errors: usize,
}

#[derive(Debug, Default, Clone, Serialize, PartialEq, Eq)]
pub struct SegmentStats {
    pub total: usize,
    pub processed: usize,
    pub errors: usize,
}

impl FilterStats {
    pub fn print_summary(&self) {
        println!("Total frames:       {}", self.total);
        println!("UI filtered:        {}", self.ui_filtered);
        println!("Blur filtered:      {}", self.blur_filtered);
        println!("Duplicate filtered: {}", self.duplicate_filtered);
        println!("Errors:             {}", self.errors);
        println!("Frames kept:        {}", self.kept);
    }
}
