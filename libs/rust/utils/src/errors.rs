//env
pub const BALANCE_SHARES_CONFIG_PATH_ENV: &str = "BALANCE_SHARES_CONFIG_PATH";
pub const BALANCE_SHARES_CHAIN_ID_ENV: &str = "BALANCE_SHARES_CHAIN_ID";
pub const BALANCE_SHARES_VERIFYING_CONTRACT_ENV: &str = "BALANCE_SHARES_VERIFYING_CONTRACT";
pub const BALANCE_SHARES_DOMAIN_NAME_ENV: &str = "BALANCE_SHARES_DOMAIN_NAME";
pub const BALANCE_SHARES_DOMAIN_VERSION_ENV: &str = "BALANCE_SHARES_DOMAIN_VERSION";

//config
pub const CONFIG_READ_FAILED: &str = "Failed to read balance shares config";
pub const CONFIG_PARSE_FAILED: &str = "Failed to parse balance shares config";

//snapshots
pub const SNAPSHOT_READ_FAILED: &str = "Failed to read ledger snapshot";
pub const SNAPSHOT_WRITE_FAILED: &str = "Failed to write ledger snapshot";
pub const SNAPSHOT_SERIALIZE_FAILED: &str = "Failed to serialize ledger snapshot";
pub const SNAPSHOT_DESERIALIZE_FAILED: &str = "Failed to deserialize ledger snapshot";
pub const SNAPSHOT_INVALID_LEDGER: &str = "Ledger snapshot has inconsistent checkpoints";
