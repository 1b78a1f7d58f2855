//! Supported payment networks and their default settlement assets.
//!
//! Auto-signing speaks x402 protocol version 1, which addresses networks by
//! human-readable name (e.g., `"base-sepolia"`). This module is the single
//! source of truth for which names are accepted and which EIP-155 chain and
//! USDC deployment each name maps to.

/// A USDC deployment on a specific network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsdcDeployment {
    /// Token contract address (0x-prefixed, checksummed).
    pub address: &'static str,
    /// EIP-712 domain name of the token contract.
    pub name: &'static str,
    /// EIP-712 domain version of the token contract.
    pub version: &'static str,
    /// Number of decimals.
    pub decimals: u32,
}

/// A supported network definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkInfo {
    /// x402 v1 network name (e.g., `"base-sepolia"`).
    pub name: &'static str,
    /// EIP-155 chain id.
    pub chain_id: u64,
    /// Whether this is a test network.
    pub testnet: bool,
    /// Default USDC deployment.
    pub usdc: UsdcDeployment,
}

impl NetworkInfo {
    /// Returns `true` if `asset` is this network's USDC deployment.
    ///
    /// Addresses are compared case-insensitively so that checksummed and
    /// lowercase spellings match.
    #[must_use]
    pub fn is_usdc(&self, asset: &str) -> bool {
        self.usdc.address.eq_ignore_ascii_case(asset)
    }
}

const fn usdc(address: &'static str, name: &'static str) -> UsdcDeployment {
    UsdcDeployment {
        address,
        name,
        version: "2",
        decimals: 6,
    }
}

/// All networks auto-signing accepts.
pub const SUPPORTED_NETWORKS: &[NetworkInfo] = &[
    NetworkInfo {
        name: "base",
        chain_id: 8453,
        testnet: false,
        usdc: usdc("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913", "USD Coin"),
    },
    NetworkInfo {
        name: "base-sepolia",
        chain_id: 84532,
        testnet: true,
        usdc: usdc("0x036CbD53842c5426634e7929541eC2318f3dCF7e", "USDC"),
    },
    NetworkInfo {
        name: "avalanche",
        chain_id: 43114,
        testnet: false,
        usdc: usdc("0xB97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E", "USD Coin"),
    },
    NetworkInfo {
        name: "avalanche-fuji",
        chain_id: 43113,
        testnet: true,
        usdc: usdc("0x5425890298aed601595a70AB815c96711a31Bc65", "USD Coin"),
    },
    NetworkInfo {
        name: "polygon",
        chain_id: 137,
        testnet: false,
        usdc: usdc("0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359", "USD Coin"),
    },
    NetworkInfo {
        name: "polygon-amoy",
        chain_id: 80002,
        testnet: true,
        usdc: usdc("0x41E94Eb71Ef8C9fAE0235d1e472b21E21B5a4dbF", "USDC"),
    },
];

/// Looks up a supported network by its x402 v1 name.
#[must_use]
pub fn network_by_name(name: &str) -> Option<&'static NetworkInfo> {
    SUPPORTED_NETWORKS.iter().find(|n| n.name == name)
}

/// Returns `true` if `name` is a supported network.
#[must_use]
pub fn is_supported(name: &str) -> bool {
    network_by_name(name).is_some()
}
