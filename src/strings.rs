/// Site holding a single channel-0 particle.
pub const UPARROW: char = match std::char::from_u32(0x00002191) {
    Some(v) => v,
    None => panic!("Invalid unicode character uparrow"),
};
/// Site holding a single channel-1 particle.
pub const DOWNARROW: char = match std::char::from_u32(0x00002193) {
    Some(v) => v,
    None => panic!("Invalid unicode character downarrow"),
};
/// Doubly occupied site.
pub const UPDOWNARROW: char = match std::char::from_u32(0x000021c5) {
    Some(v) => v,
    None => panic!("Invalid unicode character updownarrow"),
};
/// Empty site.
pub const EMPTY_SITE: char = '.';

/// Glyph for a site given the occupation of both channels.
#[inline(always)]
pub fn site_glyph(up: bool, down: bool) -> char {
    match (up, down) {
        (true, true) => UPDOWNARROW,
        (true, false) => UPARROW,
        (false, true) => DOWNARROW,
        (false, false) => EMPTY_SITE,
    }
}
