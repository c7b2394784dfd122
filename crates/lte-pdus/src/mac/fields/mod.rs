pub mod ce_tables;
pub mod mac_ce;
pub mod rar_grant;
