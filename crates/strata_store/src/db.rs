use sea_orm::DeriveIden;

#[derive(DeriveIden, Clone, Copy)]
pub enum Observation {
    Id,
    Node,
    Field,
    Value,
    Timestamp,
    Latest,
}
