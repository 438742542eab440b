//! Services: generic CRUD over the registry, the product catalog, access and contact.

mod access;
mod catalog;
mod contact;
mod crud;
mod validation;
pub use access::{AccessService, AssignInput, ASSIGN_PERMISSION};
pub use catalog::{slugify, CatalogService, ProductInput, ADMIN_PRODUCT, PUBLIC_PRODUCT};
pub use contact::ContactService;
pub use crud::CrudService;
pub use validation::RequestValidator;
