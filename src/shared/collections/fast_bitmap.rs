/// 非零价格槽位图 - 使用硬件指令扫描
///
/// Tracks which slots of a windowed book side hold a nonzero size. Finding
/// the next level behind a vacated best price becomes a word scan with
/// `trailing_zeros` (TZCNT/CTZ) instead of a slot-by-slot walk.
///
/// For a 10 000-slot window that is at most 157 `u64` loads.

#[derive(Clone, Debug, Default)]
pub struct FastBitmap {
    /// 每块64个bit
    blocks: Vec<u64>,
    /// 总bit数
    len: usize,
}

impl FastBitmap {
    /// All bits cleared
    pub fn new(len: usize) -> Self {
        Self {
            blocks: vec![0u64; len.div_ceil(64)],
            len,
        }
    }

    #[inline]
    pub fn set(&mut self, index: usize, value: bool) {
        debug_assert!(index < self.len, "bit index out of bounds");

        let mask = 1u64 << (index % 64);
        let block = &mut self.blocks[index / 64];
        if value {
            *block |= mask;
        } else {
            *block &= !mask;
        }
    }

    #[inline]
    pub fn get(&self, index: usize) -> bool {
        if index >= self.len {
            return false;
        }
        self.blocks[index / 64] & (1u64 << (index % 64)) != 0
    }

    /// Lowest set bit
    #[inline]
    pub fn find_first_one(&self) -> Option<usize> {
        self.scan_from(0)
    }

    /// Lowest set bit strictly after `start`
    #[inline]
    pub fn find_next_one(&self, start: usize) -> Option<usize> {
        match start.checked_add(1) {
            Some(next) => self.scan_from(next),
            None => None,
        }
    }

    /// Lowest set bit at or after `from`
    fn scan_from(&self, from: usize) -> Option<usize> {
        if from >= self.len {
            return None;
        }

        let first_block = from / 64;
        // 屏蔽起始块中 from 之前的位
        let head = self.blocks[first_block] & (!0u64 << (from % 64));
        if head != 0 {
            return self.bounded(first_block * 64 + head.trailing_zeros() as usize);
        }

        self.blocks[first_block + 1..]
            .iter()
            .position(|&block| block != 0)
            .map(|offset| first_block + 1 + offset)
            .and_then(|block_idx| {
                let block = self.blocks[block_idx];
                self.bounded(block_idx * 64 + block.trailing_zeros() as usize)
            })
    }

    #[inline]
    fn bounded(&self, index: usize) -> Option<usize> {
        (index < self.len).then_some(index)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// No bit set
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|&block| block == 0)
    }

    pub fn clear(&mut self) {
        self.blocks.iter_mut().for_each(|block| *block = 0);
    }

    pub fn count_ones(&self) -> usize {
        self.blocks.iter().map(|block| block.count_ones() as usize).sum()
    }

    /// Set bits in ascending order
    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(self.find_first_one(), move |&idx| self.find_next_one(idx))
    }
}
