pub fn slice_size_in_bytes<T>(slice: &[T]) -> usize {
    std::mem::size_of_val(slice)
}

/// View a slice of plain data as its raw bytes
pub fn slice_as_bytes<T: Copy>(slice: &[T]) -> &[u8] {
    let ptr = slice.as_ptr() as *const u8;
    unsafe { std::slice::from_raw_parts(ptr, slice_size_in_bytes(slice)) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_as_bytes() {
        let data = [1u16, 2u16];
        assert_eq!(slice_size_in_bytes(&data), 4);
        let bytes = slice_as_bytes(&data);
        assert_eq!(bytes.len(), 4);
        assert_eq!(u16::from_ne_bytes([bytes[2], bytes[3]]), 2);
    }
}
