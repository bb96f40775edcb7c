//! CRC32 calculation for Ogg pages.
//!
//! The polynomial is 0x04c11db7 with initial value 0 and no final XOR.

const fn get_tbl_elem(idx: u32) -> u32 {
    let mut r: u32 = idx << 24;
    let mut i = 0;
    while i < 8 {
        r = (r << 1) ^ (-(((r >> 31) & 1) as i32) as u32 & 0x04c11db7);
        i += 1;
    }
    r
}

const fn lookup_array() -> [u32; 0x100] {
    let mut lup_arr: [u32; 0x100] = [0; 0x100];
    let mut i = 0;
    while i < 0x100 {
        lup_arr[i] = get_tbl_elem(i as u32);
        i += 1;
    }
    lup_arr
}

static CRC_LOOKUP_ARRAY: &[u32] = &lookup_array();

/// Updates the CRC32 value with new data (use 0 for the first call).
pub fn update(cur: u32, array: &[u8]) -> u32 {
    let mut ret: u32 = cur;
    for av in array {
        ret = (ret << 8) ^ CRC_LOOKUP_ARRAY[(*av as u32 ^ (ret >> 24)) as usize];
    }
    ret
}

/// Checksum of a whole page given its header (CRC field zeroed), segment
/// table and body.
pub fn page_checksum(header: &[u8], segment_table: &[u8], data: &[u8]) -> u32 {
    let crc = update(0, header);
    let crc = update(crc, segment_table);
    update(crc, data)
}
