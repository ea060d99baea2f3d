//! Channel name helpers.

/// Sigils that mark a target as a channel rather than a nickname.
pub const CHANNEL_SIGILS: [char; 4] = ['#', '&', '+', '!'];

/// Maximum channel name length accepted when joining.
pub const MAX_CHANNEL_LEN: usize = 50;

/// Channel-name checks on string-like targets.
pub trait ChannelExt {
    /// True when the target starts with a channel sigil.
    ///
    /// This is the test used to tell channel traffic from private traffic;
    /// it does not validate the rest of the name.
    fn is_channel_target(&self) -> bool;

    /// True when the name is acceptable in a JOIN: a sigil, no spaces,
    /// commas or control characters, and at most [`MAX_CHANNEL_LEN`] chars.
    fn is_valid_channel_name(&self) -> bool;
}

impl ChannelExt for str {
    fn is_channel_target(&self) -> bool {
        self.starts_with(CHANNEL_SIGILS)
    }

    fn is_valid_channel_name(&self) -> bool {
        if !self.is_channel_target() || self.chars().count() > MAX_CHANNEL_LEN {
            return false;
        }
        self.chars()
            .skip(1)
            .all(|c| c != ' ' && c != ',' && !c.is_control())
    }
}

impl ChannelExt for String {
    fn is_channel_target(&self) -> bool {
        self.as_str().is_channel_target()
    }

    fn is_valid_channel_name(&self) -> bool {
        self.as_str().is_valid_channel_name()
    }
}
