//! Dynamic field values.

use crate::payload::Payload;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A dynamic field value carried in a [`Payload`].
///
/// Values fall into three groups with different equality behavior:
///
/// - **Primitives** (`Null`, `Bool`, `Integer`, `Float`, `Text`, `Bytes`)
///   compare by value.
/// - **Shared containers** (`List`, `Record`) and [`Opaque`] host handles
///   are reference-counted; [`Value::same`] compares them by identity.
/// - [`Node`] is a renderable UI node. It has its own identity rule
///   (type + key), applied by the change detector.
///
/// `PartialEq` is structural (deep) equality and is meant for tests and
/// decoded data. The sync engine never uses it for change detection.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// Double-precision float.
    Float(f64),
    /// Text string (UTF-8).
    Text(String),
    /// Byte string.
    Bytes(Vec<u8>),
    /// Shared list of values.
    List(Arc<Vec<Value>>),
    /// Shared nested record.
    Record(Arc<Payload>),
    /// Renderable UI node.
    Node(Node),
    /// Host-owned handle (callbacks, resources) compared by identity.
    Opaque(Opaque),
}

impl Value {
    /// Creates a byte string value.
    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        Value::Bytes(data.into())
    }

    /// Creates a shared list value.
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(Arc::new(items.into_iter().collect()))
    }

    /// Creates a shared record value.
    pub fn record(payload: Payload) -> Self {
        Value::Record(Arc::new(payload))
    }

    /// Identity/value equality.
    ///
    /// Primitives compare by value; containers, opaque handles and nodes
    /// compare by the identity of their shared allocation. No recursion.
    /// Two NaN floats are the same value.
    pub fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::List(a), Value::List(b)) => Arc::ptr_eq(a, b),
            (Value::Record(a), Value::Record(b)) => Arc::ptr_eq(a, b),
            (Value::Opaque(a), Value::Opaque(b)) => a.ptr_eq(b),
            (Value::Node(a), Value::Node(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Returns true if this value can be written to durable storage.
    ///
    /// Nodes and opaque handles are process-local and never persist.
    pub fn is_persistable(&self) -> bool {
        match self {
            Value::Node(_) | Value::Opaque(_) => false,
            Value::List(items) => items.iter().all(Value::is_persistable),
            Value::Record(fields) => fields.values().all(Value::is_persistable),
            _ => true,
        }
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Record(_) => "record",
            Value::Node(_) => "node",
            Value::Opaque(_) => "opaque",
        }
    }

    /// Returns true if this is a null value.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the boolean value if this is a bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer value if this is an integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the float value if this is a float.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the text value if this is a text string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the bytes if this is a byte string.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the items if this is a list.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the nested record if this is a record.
    pub fn as_record(&self) -> Option<&Payload> {
        match self {
            Value::Record(fields) => Some(fields),
            _ => None,
        }
    }

    /// Returns the node if this is a renderable node.
    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Value::Node(node) => Some(node),
            _ => None,
        }
    }

    /// Returns the handle if this is an opaque value.
    pub fn as_opaque(&self) -> Option<&Opaque> {
        match self {
            Value::Opaque(handle) => Some(handle),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(Arc::new(items))
    }
}

impl From<Payload> for Value {
    fn from(payload: Payload) -> Self {
        Value::Record(Arc::new(payload))
    }
}

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        Value::Node(node)
    }
}

impl From<Opaque> for Value {
    fn from(handle: Opaque) -> Self {
        Value::Opaque(handle)
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Null
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// A host-owned value the engine can only compare by identity.
///
/// Typical contents are callbacks or resource handles passed in as props.
/// Clones share the same allocation and are therefore the same value.
#[derive(Clone)]
pub struct Opaque {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Opaque {
    /// Wraps a value in a new identity.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Returns a reference to the wrapped value if it has type `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Returns true if both handles share the same allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.inner), Arc::as_ptr(&other.inner))
    }

    /// Name of the wrapped type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl PartialEq for Opaque {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opaque<{}>({:p})", self.type_name, Arc::as_ptr(&self.inner))
    }
}

/// The type identity of a renderable node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeType {
    /// A host element identified by tag name (`"div"`, `"text"`).
    Element(String),
    /// A component identified by the identity of its definition.
    Component(Opaque),
}

/// A renderable UI node.
///
/// Hosts rebuild nodes on every evaluation even when nothing logically
/// changed, so the content (props and children) is shared behind an `Arc`
/// and ignored by the change detector. Only the type and key identify the
/// element.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    node_type: NodeType,
    key: Option<String>,
    content: Arc<NodeContent>,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct NodeContent {
    props: Payload,
    children: Vec<Node>,
}

impl Node {
    /// Creates a node for a host element.
    pub fn element(tag: impl Into<String>) -> Self {
        Self::new(NodeType::Element(tag.into()))
    }

    /// Creates a node for a component definition.
    pub fn component(definition: &Opaque) -> Self {
        Self::new(NodeType::Component(definition.clone()))
    }

    fn new(node_type: NodeType) -> Self {
        Self {
            node_type,
            key: None,
            content: Arc::new(NodeContent::default()),
        }
    }

    /// Sets the key identity.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Adds a prop.
    #[must_use]
    pub fn with_prop(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        Arc::make_mut(&mut self.content).props.insert(name, value);
        self
    }

    /// Appends a child node.
    #[must_use]
    pub fn with_child(mut self, child: Node) -> Self {
        Arc::make_mut(&mut self.content).children.push(child);
        self
    }

    /// Returns the type identity.
    pub fn node_type(&self) -> &NodeType {
        &self.node_type
    }

    /// Returns the key identity, if any.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Returns the node's props.
    pub fn props(&self) -> &Payload {
        &self.content.props
    }

    /// Returns the node's children.
    pub fn children(&self) -> &[Node] {
        &self.content.children
    }

    /// Returns true if both nodes share the same content allocation and
    /// identity.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.content, &other.content)
            && self.node_type == other.node_type
            && self.key == other.key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_compare_by_value() {
        assert!(Value::Integer(3).same(&Value::Integer(3)));
        assert!(Value::from("a").same(&Value::from("a")));
        assert!(!Value::Integer(1).same(&Value::Float(1.0)));
        assert!(Value::Float(f64::NAN).same(&Value::Float(f64::NAN)));
        assert!(Value::Null.same(&Value::Null));
    }

    #[test]
    fn containers_compare_by_identity() {
        let a = Value::list(vec![Value::Integer(1)]);
        let b = Value::list(vec![Value::Integer(1)]);

        // Structurally equal, different allocations
        assert_eq!(a, b);
        assert!(!a.same(&b));
        assert!(a.same(&a.clone()));
    }

    #[test]
    fn opaque_identity() {
        let handle = Opaque::new(42u32);
        let other = Opaque::new(42u32);

        assert!(handle.ptr_eq(&handle.clone()));
        assert!(!handle.ptr_eq(&other));
        assert_eq!(handle.downcast_ref::<u32>(), Some(&42));
        assert!(handle.downcast_ref::<String>().is_none());
    }

    #[test]
    fn node_builders() {
        let node = Node::element("li")
            .with_key("row-1")
            .with_prop("class", "selected")
            .with_child(Node::element("span"));

        assert_eq!(node.node_type(), &NodeType::Element("li".into()));
        assert_eq!(node.key(), Some("row-1"));
        assert_eq!(node.props().get("class"), Some(&Value::from("selected")));
        assert_eq!(node.children().len(), 1);
    }

    #[test]
    fn persistable_values() {
        assert!(Value::Integer(1).is_persistable());
        assert!(Value::list(vec![Value::from("x")]).is_persistable());
        assert!(!Value::from(Node::element("div")).is_persistable());
        assert!(!Value::list(vec![Value::Opaque(Opaque::new(()))]).is_persistable());

        let nested: Payload = [("cb", Value::Opaque(Opaque::new(1u8)))].into_iter().collect();
        assert!(!Value::record(nested).is_persistable());
    }

    #[test]
    fn from_impls() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(7i32), Value::Integer(7));
        assert_eq!(Value::from(2.5), Value::Float(2.5));
        assert_eq!(Value::from(()), Value::Null);
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::Text("x".into()));
    }
}
