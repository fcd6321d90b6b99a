use crate::priv_prelude::*;

/// Interface registry embedded in every node and network.
///
/// Owns the index→interface map and the allocation counter. The counter only
/// ever advances; deleting an index does not make it eligible for reuse before
/// the counter naturally reaches it again.
pub struct IfaceMap {
    map: BTreeMap<u32, Arc<Iface>>,
    next_index: u32,
}

impl IfaceMap {
    pub fn new() -> IfaceMap {
        IfaceMap {
            map: BTreeMap::new(),
            next_index: 0,
        }
    }

    /// The index the next allocation will return, without consuming it.
    pub fn next_free(&self) -> u32 {
        let mut index = self.next_index;
        while self.map.contains_key(&index) {
            index += 1;
        }
        index
    }

    /// Allocate the next free index and advance the counter past it.
    pub fn alloc(&mut self) -> u32 {
        let index = self.next_free();
        self.next_index = index + 1;
        index
    }

    /// Register an interface at `index`. Fails without mutating anything if the
    /// index is already taken.
    pub fn insert(&mut self, index: u32, iface: Arc<Iface>) -> Result<(), Error> {
        if self.map.contains_key(&index) {
            return Err(Error::DuplicateIfindex(index));
        }
        self.map.insert(index, iface);
        Ok(())
    }

    pub fn remove(&mut self, index: u32) -> Result<Arc<Iface>, Error> {
        self.map.remove(&index).ok_or(Error::UnknownIfindex(index))
    }

    pub fn get(&self, index: u32) -> Option<Arc<Iface>> {
        self.map.get(&index).cloned()
    }

    pub fn contains(&self, index: u32) -> bool {
        self.map.contains_key(&index)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Attached interfaces. The backing map always iterates in index order;
    /// `_sort` records whether the caller relies on that ordering.
    pub fn values(&self, _sort: bool) -> Vec<Arc<Iface>> {
        self.map.values().cloned().collect()
    }

    /// Index of an interface by identity, if registered.
    pub fn index_of(&self, iface: &Arc<Iface>) -> Option<u32> {
        self.map
            .iter()
            .find(|(_index, registered)| Arc::ptr_eq(registered, iface))
            .map(|(index, _registered)| *index)
    }
}

impl Default for IfaceMap {
    fn default() -> IfaceMap {
        IfaceMap::new()
    }
}

/// Identity and export metadata shared by nodes and networks.
pub struct ObjectCore {
    pub id: u32,
    pub name: String,
    /// Wire node type. `None` suppresses [`NodeData`] export, used for network
    /// objects that are not meant to be reported as nodes.
    pub node_type: Option<NodeType>,
    pub model: Option<String>,
    pub canvas: Option<u32>,
    pub icon: Option<String>,
    pub opaque: Option<String>,
    pub services: Vec<String>,
    /// Name of the remote server this object runs on, if any.
    pub server: Option<String>,
}

impl ObjectCore {
    /// Build an exportable [`NodeData`] snapshot, or `None` when the wire node
    /// type is unset. Never mutates state.
    pub fn data(
        &self,
        position: (Option<f64>, Option<f64>, Option<f64>),
        message_type: u32,
        lat: Option<f64>,
        lon: Option<f64>,
        alt: Option<f64>,
        source: Option<&str>,
    ) -> Option<NodeData> {
        let node_type = self.node_type?;
        let services = if self.services.is_empty() {
            None
        } else {
            Some(self.services.join("|"))
        };
        let (x, y, _z) = position;
        Some(NodeData {
            message_type,
            id: self.id,
            node_type,
            name: self.name.clone(),
            canvas: self.canvas,
            icon: self.icon.clone(),
            opaque: self.opaque.clone(),
            x,
            y,
            latitude: lat,
            longitude: lon,
            altitude: alt,
            model: self.model.clone(),
            server: self.server.clone(),
            services,
            source: source.map(str::to_owned),
        })
    }
}

/// Behavior common to every topology object (host nodes and networks).
pub trait NodeObject: Send + Sync {
    fn id(&self) -> u32;

    fn name(&self) -> &str;

    /// Update the object's position, propagating to attached interfaces on
    /// change. Returns whether the position changed.
    fn set_position(&self, x: Option<f64>, y: Option<f64>, z: Option<f64>) -> bool;

    fn position(&self) -> (Option<f64>, Option<f64>, Option<f64>);

    /// Name of the interface at `ifindex`.
    fn ifname(&self, ifindex: u32) -> Result<String, Error>;

    /// Attached interfaces, ordered by index when `sort` is set.
    fn netifs(&self, sort: bool) -> Vec<Arc<Iface>>;

    fn num_netifs(&self) -> usize {
        self.netifs(false).len()
    }

    /// Index of an interface by identity, if attached to this object.
    fn ifindex_of(&self, iface: &Arc<Iface>) -> Option<u32>;

    /// Allocate the next free interface index.
    fn new_ifindex(&self) -> u32;

    /// Build an exportable node snapshot, or `None` when the object's wire node
    /// type is unset.
    fn data(
        &self,
        message_type: u32,
        lat: Option<f64>,
        lon: Option<f64>,
        alt: Option<f64>,
        source: Option<&str>,
    ) -> Option<NodeData>;

    /// Directed link records for this object. Host nodes report none; networks
    /// override this with the link-synthesis algorithm.
    fn all_link_data(&self, _flags: u32) -> Vec<LinkData> {
        Vec::new()
    }
}
