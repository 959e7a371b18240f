//! Response items and the ordered store a read produces.
//!
//! A [`ReadResponse`] owns one [`ResponseItem`] per requested value, in request
//! order. Releasing an item drops its value and leaves an empty slot behind, so
//! a second release is detectable and does nothing. Releasing a response
//! releases its items and never touches the request or execution context it
//! came from.
//!
//! # Example
//!
//! ```
//! use modbus_task::{DataType, PlcValue, ReadResponse, ResponseItem};
//!
//! let mut response = ReadResponse::with_capacity(2);
//! response.push(ResponseItem::new(100, DataType::UInt, PlcValue::UInt(7)));
//! response.push(ResponseItem::new(101, DataType::UInt, PlcValue::UInt(8)));
//!
//! assert_eq!(response.release(), 2);
//! assert_eq!(response.release(), 0); // already released
//! assert_eq!(response.retained(), 0);
//! ```

use tracing::trace;

use crate::field::DataType;
use crate::value::PlcValue;

/// One decoded value plus the address it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseItem {
    address: u16,
    data_type: DataType,
    value: Option<PlcValue>,
}

impl ResponseItem {
    /// Creates an item holding `value`.
    pub fn new(address: u16, data_type: DataType, value: PlcValue) -> Self {
        Self {
            address,
            data_type,
            value: Some(value),
        }
    }

    /// Address of the first bit or register of this value.
    pub fn address(&self) -> u16 {
        self.address
    }

    /// Data type the value was decoded as.
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// The value, or `None` once released.
    pub fn value(&self) -> Option<&PlcValue> {
        self.value.as_ref()
    }

    /// Returns whether the value has been released.
    pub fn is_released(&self) -> bool {
        self.value.is_none()
    }

    /// Releases the value.
    ///
    /// Returns `true` if a value was dropped, `false` if the item was already
    /// released.
    pub fn release(&mut self) -> bool {
        self.value.take().is_some()
    }
}

/// Ordered store of the items produced by one read.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReadResponse {
    items: Vec<ResponseItem>,
}

impl ReadResponse {
    /// Creates an empty store with room for `capacity` items.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }

    /// Appends an item after the existing ones.
    pub fn push(&mut self, item: ResponseItem) {
        self.items.push(item);
    }

    /// Number of items, released or not.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns whether the store holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the item at `index`.
    pub fn get(&self, index: usize) -> Option<&ResponseItem> {
        self.items.get(index)
    }

    /// Iterates over the items in request order.
    pub fn iter(&self) -> std::slice::Iter<'_, ResponseItem> {
        self.items.iter()
    }

    /// All items in request order.
    pub fn items(&self) -> &[ResponseItem] {
        &self.items
    }

    /// Values still held, in request order.
    pub fn values(&self) -> Vec<PlcValue> {
        self.items.iter().filter_map(|item| item.value).collect()
    }

    /// Number of items whose value has not been released.
    pub fn retained(&self) -> usize {
        self.items.iter().filter(|item| !item.is_released()).count()
    }

    /// Releases every item and returns how many values were dropped by this
    /// call. Calling it again returns 0.
    pub fn release(&mut self) -> usize {
        let released = self
            .items
            .iter_mut()
            .map(ResponseItem::release)
            .filter(|&dropped| dropped)
            .count();
        trace!(items = self.items.len(), released, "released response items");
        released
    }
}

impl<'a> IntoIterator for &'a ReadResponse {
    type Item = &'a ResponseItem;
    type IntoIter = std::slice::Iter<'a, ResponseItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ReadResponse {
        let mut response = ReadResponse::with_capacity(3);
        for (i, v) in [10u16, 20, 30].into_iter().enumerate() {
            response.push(ResponseItem::new(i as u16, DataType::UInt, PlcValue::UInt(v)));
        }
        response
    }

    #[test]
    fn test_item_release_twice() {
        let mut item = ResponseItem::new(5, DataType::Int, PlcValue::Int(-1));
        assert!(!item.is_released());
        assert!(item.release());
        assert!(item.is_released());
        assert!(item.value().is_none());
        assert!(!item.release());
    }

    #[test]
    fn test_response_order() {
        let response = sample();
        assert_eq!(response.len(), 3);
        assert_eq!(
            response.values(),
            vec![PlcValue::UInt(10), PlcValue::UInt(20), PlcValue::UInt(30)]
        );
        let addresses: Vec<u16> = response.iter().map(ResponseItem::address).collect();
        assert_eq!(addresses, vec![0, 1, 2]);
    }

    #[test]
    fn test_response_release_idempotent() {
        let mut response = sample();
        assert_eq!(response.retained(), 3);
        assert_eq!(response.release(), 3);
        assert_eq!(response.retained(), 0);
        assert_eq!(response.release(), 0);
        // slots stay in place after release
        assert_eq!(response.len(), 3);
    }

    #[test]
    fn test_partial_release() {
        let mut response = sample();
        let mut items = response.items.clone();
        items[1].release();
        response.items = items;
        assert_eq!(response.release(), 2);
    }

    #[test]
    fn test_empty_response() {
        let mut response = ReadResponse::default();
        assert!(response.is_empty());
        assert_eq!(response.release(), 0);
    }
}
