use crate::priv_prelude::*;

/// Command path a net client issues device commands through, either a node's
/// host-side executor or its in-namespace control channel.
pub type CmdRunner = Arc<dyn Fn(&str) -> Result<String, Error> + Send + Sync>;

/// Network-configuration capability consumed by nodes and networks.
///
/// Implementations format device-level commands and push them through an
/// injected [`CmdRunner`]; they never touch the OS directly.
pub trait NetClient: Send + Sync {
    fn device_up(&self, device: &str) -> Result<(), Error>;
    /// Move a device into the network namespace of process `pid`.
    fn device_ns(&self, device: &str, pid: u32) -> Result<(), Error>;
    fn device_name(&self, device: &str, name: &str) -> Result<(), Error>;
    fn device_mac(&self, device: &str, mac: &MacAddr) -> Result<(), Error>;
    fn device_flush(&self, device: &str) -> Result<(), Error>;
    fn delete_device(&self, device: &str) -> Result<(), Error>;
    fn checksums_off(&self, device: &str) -> Result<(), Error>;
    fn create_veth(&self, name: &str, peer: &str) -> Result<(), Error>;
    fn create_address(
        &self,
        device: &str,
        address: &str,
        broadcast: Option<&str>,
    ) -> Result<(), Error>;
    fn delete_address(&self, device: &str, address: &str) -> Result<(), Error>;
    /// Kernel-assigned interface index of a device.
    fn get_ifindex(&self, device: &str) -> Result<u32, Error>;
    fn set_hostname(&self, name: &str) -> Result<(), Error>;
}

/// Plain Linux implementation over `ip`/`ethtool`/`hostname`.
pub struct LinuxNetClient {
    run: CmdRunner,
}

impl LinuxNetClient {
    pub fn new(run: CmdRunner) -> LinuxNetClient {
        LinuxNetClient { run }
    }

    fn run(&self, args: &str) -> Result<String, Error> {
        (self.run)(args)
    }
}

impl NetClient for LinuxNetClient {
    fn device_up(&self, device: &str) -> Result<(), Error> {
        let _output = self.run(&format!("ip link set {} up", device))?;
        Ok(())
    }

    fn device_ns(&self, device: &str, pid: u32) -> Result<(), Error> {
        let _output = self.run(&format!("ip link set {} netns {}", device, pid))?;
        Ok(())
    }

    fn device_name(&self, device: &str, name: &str) -> Result<(), Error> {
        let _output = self.run(&format!("ip link set {} name {}", device, name))?;
        Ok(())
    }

    fn device_mac(&self, device: &str, mac: &MacAddr) -> Result<(), Error> {
        let _output = self.run(&format!("ip link set dev {} address {}", device, mac))?;
        Ok(())
    }

    fn device_flush(&self, device: &str) -> Result<(), Error> {
        let _output = self.run(&format!("ip address flush dev {}", device))?;
        Ok(())
    }

    fn delete_device(&self, device: &str) -> Result<(), Error> {
        let _output = self.run(&format!("ip link delete {}", device))?;
        Ok(())
    }

    fn checksums_off(&self, device: &str) -> Result<(), Error> {
        let _output = self.run(&format!("ethtool -K {} rx off tx off", device))?;
        Ok(())
    }

    fn create_veth(&self, name: &str, peer: &str) -> Result<(), Error> {
        let _output = self.run(&format!(
            "ip link add name {} type veth peer name {}",
            name, peer,
        ))?;
        Ok(())
    }

    fn create_address(
        &self,
        device: &str,
        address: &str,
        broadcast: Option<&str>,
    ) -> Result<(), Error> {
        let cmd = match broadcast {
            Some(broadcast) => format!(
                "ip address add {} broadcast {} dev {}",
                address, broadcast, device,
            ),
            None => format!("ip address add {} dev {}", address, device),
        };
        let _output = self.run(&cmd)?;
        Ok(())
    }

    fn delete_address(&self, device: &str, address: &str) -> Result<(), Error> {
        let _output = self.run(&format!("ip address delete {} dev {}", address, device))?;
        Ok(())
    }

    fn get_ifindex(&self, device: &str) -> Result<u32, Error> {
        let cmd = format!("cat /sys/class/net/{}/ifindex", device);
        let output = self.run(&cmd)?;
        output
            .trim()
            .parse::<u32>()
            .map_err(|_| Error::UnexpectedOutput { cmd, output })
    }

    fn set_hostname(&self, name: &str) -> Result<(), Error> {
        let _output = self.run(&format!("hostname {}", name))?;
        Ok(())
    }
}

/// Software-switch variant. Bridge-level operations live outside this crate;
/// every device-level operation defers to the plain Linux client.
pub struct OvsNetClient {
    linux: LinuxNetClient,
}

impl OvsNetClient {
    pub fn new(run: CmdRunner) -> OvsNetClient {
        OvsNetClient {
            linux: LinuxNetClient::new(run),
        }
    }
}

impl NetClient for OvsNetClient {
    fn device_up(&self, device: &str) -> Result<(), Error> {
        self.linux.device_up(device)
    }

    fn device_ns(&self, device: &str, pid: u32) -> Result<(), Error> {
        self.linux.device_ns(device, pid)
    }

    fn device_name(&self, device: &str, name: &str) -> Result<(), Error> {
        self.linux.device_name(device, name)
    }

    fn device_mac(&self, device: &str, mac: &MacAddr) -> Result<(), Error> {
        self.linux.device_mac(device, mac)
    }

    fn device_flush(&self, device: &str) -> Result<(), Error> {
        self.linux.device_flush(device)
    }

    fn delete_device(&self, device: &str) -> Result<(), Error> {
        self.linux.delete_device(device)
    }

    fn checksums_off(&self, device: &str) -> Result<(), Error> {
        self.linux.checksums_off(device)
    }

    fn create_veth(&self, name: &str, peer: &str) -> Result<(), Error> {
        self.linux.create_veth(name, peer)
    }

    fn create_address(
        &self,
        device: &str,
        address: &str,
        broadcast: Option<&str>,
    ) -> Result<(), Error> {
        self.linux.create_address(device, address, broadcast)
    }

    fn delete_address(&self, device: &str, address: &str) -> Result<(), Error> {
        self.linux.delete_address(device, address)
    }

    fn get_ifindex(&self, device: &str) -> Result<u32, Error> {
        self.linux.get_ifindex(device)
    }

    fn set_hostname(&self, name: &str) -> Result<(), Error> {
        self.linux.set_hostname(name)
    }
}

/// Select the net-client family for a session.
pub fn get_net_client(use_ovs: bool, run: CmdRunner) -> Arc<dyn NetClient> {
    if use_ovs {
        Arc::new(OvsNetClient::new(run))
    } else {
        Arc::new(LinuxNetClient::new(run))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording_client() -> (LinuxNetClient, Arc<Mutex<Vec<String>>>) {
        let commands = Arc::new(Mutex::new(Vec::new()));
        let recorded = commands.clone();
        let run: CmdRunner = Arc::new(move |args: &str| {
            recorded.lock().unwrap().push(args.to_owned());
            Ok("2".to_owned())
        });
        (LinuxNetClient::new(run), commands)
    }

    #[test]
    fn formats_device_commands() {
        let (client, commands) = recording_client();
        client.device_up("eth0").unwrap();
        client.device_ns("veth1.0.ab", 4242).unwrap();
        client.device_name("veth1.0.abp", "eth0").unwrap();
        client.checksums_off("eth0").unwrap();
        client.create_veth("veth1.0.ab", "veth1.0.abp").unwrap();
        client
            .create_address("eth0", "10.0.0.1/24", Some("+"))
            .unwrap();
        client.create_address("eth0", "fd00::2/64", None).unwrap();
        client.set_hostname("n1").unwrap();
        let commands = commands.lock().unwrap();
        assert_eq!(
            *commands,
            vec![
                "ip link set eth0 up",
                "ip link set veth1.0.ab netns 4242",
                "ip link set veth1.0.abp name eth0",
                "ethtool -K eth0 rx off tx off",
                "ip link add name veth1.0.ab type veth peer name veth1.0.abp",
                "ip address add 10.0.0.1/24 broadcast + dev eth0",
                "ip address add fd00::2/64 dev eth0",
                "hostname n1",
            ],
        );
    }

    #[test]
    fn get_ifindex_parses_output() {
        let (client, _commands) = recording_client();
        assert_eq!(client.get_ifindex("eth0").unwrap(), 2);
    }

    #[test]
    fn get_ifindex_rejects_garbage() {
        let run: CmdRunner = Arc::new(|_args: &str| Ok("not-a-number".to_owned()));
        let client = LinuxNetClient::new(run);
        assert!(matches!(
            client.get_ifindex("eth0"),
            Err(Error::UnexpectedOutput { .. }),
        ));
    }
}
