/// Protocol entities of the UE stack
#[derive(PartialEq, Eq, Hash, Clone, Debug, Copy)]
pub enum LteEntity {
    /// Physical layer
    Phy,
    /// Medium access control
    Mac,
    /// Radio link control
    Rlc,
    /// Packet data convergence protocol
    Pdcp,
    /// Radio resource control
    Rrc,
    /// Non-access stratum
    Nas,
    /// IP gateway
    Gw,
}
