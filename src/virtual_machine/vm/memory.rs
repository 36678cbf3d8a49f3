/// Data memory addressed indirectly through registers.
///
/// Addresses wrap modulo the memory size. A zero-sized memory reads as zero
/// and discards writes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) struct Memory(Vec<u16>);

impl Memory {
    pub(super) fn new(size: usize) -> Self {
        Self(vec![0; size])
    }

    pub(super) fn len(&self) -> usize {
        self.0.len()
    }

    fn index(&self, addr: u16) -> Option<usize> {
        (!self.0.is_empty()).then(|| addr as usize % self.0.len())
    }

    pub(super) fn read(&self, addr: u16) -> u16 {
        self.index(addr).map_or(0, |i| self.0[i])
    }

    pub(super) fn write(&mut self, addr: u16, value: u16) {
        if let Some(i) = self.index(addr) {
            self.0[i] = value;
        }
    }

    /// Zeroes memory, then copies `input` to the start. Input past the end is dropped.
    pub(super) fn load(&mut self, input: &[u16]) {
        self.clear();
        let n = input.len().min(self.0.len());
        self.0[..n].copy_from_slice(&input[..n]);
    }

    pub(super) fn clear(&mut self) {
        self.0.fill(0);
    }

    pub(super) fn as_slice(&self) -> &[u16] {
        &self.0
    }
}
