use crate::priv_prelude::*;

/// An interface address with prefix length, eg. `10.0.0.1/24` or `fd00::2/64`.
///
/// Keeping the family in the type means link-data synthesis classifies
/// addresses with a `match` instead of re-parsing strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IfaceAddr {
    V4 { addr: Ipv4Addr, prefix: u8 },
    V6 { addr: Ipv6Addr, prefix: u8 },
}

impl IfaceAddr {
    pub fn is_ipv4(&self) -> bool {
        matches!(self, IfaceAddr::V4 { .. })
    }

    pub fn is_ipv6(&self) -> bool {
        matches!(self, IfaceAddr::V6 { .. })
    }

    pub fn addr(&self) -> IpAddr {
        match *self {
            IfaceAddr::V4 { addr, .. } => IpAddr::V4(addr),
            IfaceAddr::V6 { addr, .. } => IpAddr::V6(addr),
        }
    }

    pub fn prefix(&self) -> u8 {
        match *self {
            IfaceAddr::V4 { prefix, .. } => prefix,
            IfaceAddr::V6 { prefix, .. } => prefix,
        }
    }
}

impl fmt::Display for IfaceAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.addr(), self.prefix())
    }
}

impl FromStr for IfaceAddr {
    type Err = Error;

    fn from_str(s: &str) -> Result<IfaceAddr, Error> {
        let (addr, prefix) = match s.split_once('/') {
            Some((addr, prefix)) => {
                let prefix = prefix
                    .parse::<u8>()
                    .map_err(|_| Error::InvalidAddress(s.to_owned()))?;
                (addr, Some(prefix))
            }
            None => (s, None),
        };
        let addr = addr
            .parse::<IpAddr>()
            .map_err(|_| Error::InvalidAddress(s.to_owned()))?;
        let iface_addr = match addr {
            IpAddr::V4(addr) => {
                let prefix = prefix.unwrap_or(32);
                if prefix > 32 {
                    return Err(Error::InvalidAddress(s.to_owned()));
                }
                IfaceAddr::V4 { addr, prefix }
            }
            IpAddr::V6(addr) => {
                let prefix = prefix.unwrap_or(128);
                if prefix > 128 {
                    return Err(Error::InvalidAddress(s.to_owned()));
                }
                IfaceAddr::V6 { addr, prefix }
            }
        };
        Ok(iface_addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_families() {
        let v4: IfaceAddr = "10.0.0.1/24".parse().unwrap();
        assert!(v4.is_ipv4());
        assert_eq!(v4.prefix(), 24);
        assert_eq!(v4.to_string(), "10.0.0.1/24");

        let v6: IfaceAddr = "fd00::2/64".parse().unwrap();
        assert!(v6.is_ipv6());
        assert_eq!(v6.prefix(), 64);
    }

    #[test]
    fn missing_prefix_defaults_to_host_mask() {
        let v4: IfaceAddr = "192.168.0.9".parse().unwrap();
        assert_eq!(v4.prefix(), 32);
        let v6: IfaceAddr = "fd00::9".parse().unwrap();
        assert_eq!(v6.prefix(), 128);
    }

    #[test]
    fn rejects_bad_input() {
        assert!("10.0.0.1/33".parse::<IfaceAddr>().is_err());
        assert!("fd00::2/129".parse::<IfaceAddr>().is_err());
        assert!("not-an-address/24".parse::<IfaceAddr>().is_err());
    }
}
