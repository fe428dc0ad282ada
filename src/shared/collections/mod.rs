/// Collections for the windowed book
///
/// - FastBitmap: nonzero-slot bitmap scanned with TZCNT/CTZ

pub mod fast_bitmap;

pub use fast_bitmap::FastBitmap;
