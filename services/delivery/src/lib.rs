//! The delivery participant: address feasibility checks, the
//! created/delivering/delivered/canceled status machine, and the
//! address-directory replica (spec.md §4.4; SPEC_FULL §4).

mod address_book;
mod handler;
mod store;

pub use address_book::{AddressBook, AddressBookError, ClientAddress};
pub use handler::{
    CancelHandler, CheckCancelHandler, CheckHandler, ClientAddressHandler, OrdersProducedHandler,
    RevertCancelHandler,
};
pub use store::{DeliveryStatus, DeliveryStore, DeliveryStoreError};
