pub mod rar_pdu;
pub mod sch_pdu;
pub mod sch_pdu_builder;
