/// Metadata keys written onto gateway objects.
///
/// The webhook path correlates events back to local records using only
/// these values, so both sides must agree on the spelling.
pub mod keys {
    pub const PAYMENT_ID: &str = "paymentId";
    pub const USER_ID: &str = "userId";
    pub const TENANT_ID: &str = "tenantId";
    pub const PROPERTY_ID: &str = "propertyId";
    pub const KIND: &str = "type";
    pub const DESCRIPTION: &str = "description";
    pub const PLAN: &str = "plan";
    pub const EMAIL: &str = "email";
    pub const ROLE: &str = "role";
}
