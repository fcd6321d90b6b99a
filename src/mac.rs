use crate::priv_prelude::*;

/// A six-byte hardware (MAC) address.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddr {
    bytes: [u8; 6],
}

impl MacAddr {
    pub fn from_bytes(bytes: &[u8]) -> MacAddr {
        let mut b = [0u8; 6];
        b[..].clone_from_slice(bytes);
        MacAddr { bytes: b }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..]
    }

    /// Generate a random, locally-administered unicast address.
    pub fn random() -> MacAddr {
        let mut b: [u8; 6] = rand::random();
        b[0] &= 0xfc;
        b[0] |= 0x02;
        MacAddr { bytes: b }
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let b = &self.bytes;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5],
        )
    }
}

impl fmt::Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for MacAddr {
    type Err = Error;

    fn from_str(s: &str) -> Result<MacAddr, Error> {
        let mut bytes = [0u8; 6];
        let mut groups = s.split(':');
        for byte in &mut bytes {
            let group = groups
                .next()
                .ok_or_else(|| Error::InvalidMac(s.to_owned()))?;
            *byte = u8::from_str_radix(group, 16).map_err(|_| Error::InvalidMac(s.to_owned()))?;
        }
        if groups.next().is_some() {
            return Err(Error::InvalidMac(s.to_owned()));
        }
        Ok(MacAddr { bytes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_round_trips() {
        let addr: MacAddr = "02:ab:cd:00:01:ff".parse().unwrap();
        assert_eq!(addr.to_string(), "02:ab:cd:00:01:ff");
    }

    #[test]
    fn rejects_malformed_strings() {
        assert!("02:ab:cd:00:01".parse::<MacAddr>().is_err());
        assert!("02:ab:cd:00:01:ff:11".parse::<MacAddr>().is_err());
        assert!("02:ab:zz:00:01:ff".parse::<MacAddr>().is_err());
    }

    #[test]
    fn random_is_local_unicast() {
        for _ in 0..32 {
            let addr = MacAddr::random();
            let first = addr.as_bytes()[0];
            assert_eq!(first & 0x01, 0);
            assert_eq!(first & 0x02, 0x02);
        }
    }
}
