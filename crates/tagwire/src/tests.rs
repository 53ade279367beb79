//! End-to-end tests: a customer service over a unix socket pair.

use std::{
    collections::HashMap,
    io::Write,
    net::Shutdown,
    os::unix::net::UnixStream,
};

use serde::{Deserialize, Serialize};

use crate::{
    interface::selector,
    middleware::service::ServiceHandle,
    prelude::*,
    ser_de::EncodingByte,
    types::Variant2,
};

pub type CustomerId = u64;

/// Two customers are the same customer when every field matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    pub email: Option<String>,
    pub balance: i64,
    pub tags: Vec<u16>,

    #[serde(with = "serde_bytes")]
    pub avatar: Vec<u8>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustomerError {
    #[default]
    None,
    CustomerExists,
    InvalidCustomerId,
    IoError,
}

impl ErrorKind for CustomerError {}

impl From<InvokeError> for CustomerError {
    fn from(e: InvokeError) -> Self {
        log::error!("customer call failed: {}", e);
        Self::IoError
    }
}

#[interface("io.example.CustomerService")]
pub trait CustomerService {
    /// Register a new customer, returning the id the service assigned.
    fn add(customer: Customer) -> Result<CustomerId, CustomerError>;

    fn remove(id: CustomerId) -> Result<(), CustomerError>;

    /// Replace an existing customer.
    fn update(id: CustomerId, customer: Customer) -> Result<(), CustomerError>;

    fn get(id: CustomerId) -> Result<Customer, CustomerError>;
}

#[derive(Debug, Default)]
struct CustomerStore {
    next_id: CustomerId,
    customers: HashMap<CustomerId, Customer>,
}

impl CustomerService for CustomerStore {
    fn add(&mut self, customer: Customer) -> Result<CustomerId, CustomerError> {
        if self.customers.values().any(|c| *c == customer) {
            return Err(CustomerError::CustomerExists);
        }

        let id = self.next_id;
        self.next_id += 1;
        self.customers.insert(id, customer);
        Ok(id)
    }

    fn remove(&mut self, id: CustomerId) -> Result<(), CustomerError> {
        self.customers
            .remove(&id)
            .map(drop)
            .ok_or(CustomerError::InvalidCustomerId)
    }

    fn update(&mut self, id: CustomerId, customer: Customer) -> Result<(), CustomerError> {
        match self.customers.get_mut(&id) {
            Some(existing) => {
                *existing = customer;
                Ok(())
            }
            None => Err(CustomerError::InvalidCustomerId),
        }
    }

    fn get(&mut self, id: CustomerId) -> Result<Customer, CustomerError> {
        self.customers
            .get(&id)
            .cloned()
            .ok_or(CustomerError::InvalidCustomerId)
    }
}

type Ctx = ContextManager<StreamReader<UnixStream>, StreamWriter<UnixStream>>;

fn customer(n: u32) -> Customer {
    Customer {
        name: format!("customer {}", n),
        email: None,
        balance: -1200,
        tags: vec![3, 300, 3000],
        avatar: vec![0x89, b'P', b'N', b'G'],
    }
}

/// Start a customer service on one end of a socket pair, returning the other end.
fn start() -> (UnixStream, ServiceHandle<CustomerStore>) {
    let _ = pretty_env_logger::try_init();

    let (client, server) = UnixStream::pair().unwrap();
    let dispatcher = DispatcherBuilder::<CustomerStore, _, _>::new()
        .config(DispatcherConfig {
            name: "customers".into(),
            ..Default::default()
        })
        .bind_interface::<CustomerServiceApi>()
        .unwrap()
        .build(
            StreamReader::new(server.try_clone().unwrap()),
            StreamWriter::new(server.try_clone().unwrap()),
        );

    // unblocks a pending read on stop
    dispatcher.stop_handle().on_stop(move || {
        let _ = server.shutdown(Shutdown::Both);
    });

    let service = service::spawn(dispatcher, CustomerStore::default()).unwrap();
    (client, service)
}

fn context(stream: &UnixStream) -> Ctx {
    ContextManager::new(
        StreamReader::new(stream.try_clone().unwrap()),
        StreamWriter::new(stream.try_clone().unwrap()),
    )
}

#[test]
fn test_customer_lifecycle() {
    let (client, service) = start();
    let mut ctx = context(&client);

    let alice = customer(1);
    let id = CustomerServiceClient::add(&mut ctx, alice.clone())
        .flatten_invoke()
        .unwrap();
    assert_eq!(
        CustomerServiceClient::add(&mut ctx, alice.clone()).unwrap(),
        Err(CustomerError::CustomerExists)
    );
    assert_eq!(CustomerServiceClient::get(&mut ctx, id).unwrap(), Ok(alice.clone()));

    let updated = Customer {
        email: Some("alice@example.com".into()),
        balance: 50,
        ..alice
    };
    assert_eq!(
        CustomerServiceClient::update(&mut ctx, id, updated.clone()).unwrap(),
        Ok(())
    );
    assert_eq!(
        CustomerServiceClient::get(&mut ctx, id).flatten_invoke(),
        Ok(updated)
    );
    assert_eq!(
        CustomerServiceClient::update(&mut ctx, id + 100, customer(2)).unwrap(),
        Err(CustomerError::InvalidCustomerId)
    );

    let bob = CustomerServiceClient::add(&mut ctx, customer(2)).unwrap().unwrap();
    assert_ne!(bob, id);
    assert_eq!(CustomerServiceClient::remove(&mut ctx, id).unwrap(), Ok(()));
    assert_eq!(
        CustomerServiceClient::remove(&mut ctx, id).unwrap().error(),
        CustomerError::InvalidCustomerId
    );
    assert_eq!(ctx.invocations(), 9);

    let (store, res) = service.stop().unwrap();
    assert!(res.is_ok());
    assert_eq!(store.customers.len(), 1);
    assert!(store.customers.contains_key(&bob));
}

#[test]
fn test_get_returns_added_customer() {
    let (client, service) = start();
    let mut ctx = context(&client);

    let r1 = customer(1);
    let id = CustomerServiceClient::add(&mut ctx, r1.clone())
        .flatten_invoke()
        .unwrap();
    assert_eq!(
        CustomerServiceClient::add(&mut ctx, r1.clone()).flatten_invoke(),
        Err(CustomerError::CustomerExists)
    );
    assert_eq!(
        CustomerServiceClient::get(&mut ctx, id).flatten_invoke(),
        Ok(r1.clone())
    );

    // any differing field makes a distinct customer
    let twin = Customer {
        tags: vec![3],
        ..r1.clone()
    };
    let twin_id = CustomerServiceClient::add(&mut ctx, twin.clone())
        .flatten_invoke()
        .unwrap();
    assert_ne!(twin_id, id);
    assert_eq!(
        CustomerServiceClient::get(&mut ctx, twin_id).flatten_invoke(),
        Ok(twin)
    );
    assert_eq!(
        CustomerServiceClient::get(&mut ctx, id).flatten_invoke(),
        Ok(r1)
    );

    let (store, res) = service.stop().unwrap();
    assert!(res.is_ok());
    assert_eq!(store.customers.len(), 2);
}

#[test]
fn test_unknown_selector_keeps_connection() {
    let (mut client, service) = start();

    // a request for a method this service does not implement
    let mut request = serialize(&selector("io.example.CustomerService", "audit")).unwrap();
    request.extend(serialize(&(7u32, "reason", vec![customer(7)])).unwrap());
    client.write_all(&request).unwrap();

    let mut ctx = context(&client);
    let id = CustomerServiceClient::add(&mut ctx, customer(3))
        .flatten_invoke()
        .unwrap();
    assert_eq!(
        CustomerServiceClient::get(&mut ctx, id).flatten_invoke(),
        Ok(customer(3))
    );

    let (store, res) = service.stop().unwrap();
    assert!(res.is_ok());
    assert_eq!(store.customers.len(), 1);
}

#[test]
fn test_bad_arguments_keep_connection() {
    let (mut client, service) = start();

    // arguments that do not decode as `update`'s (id, customer) pair
    let mut request = serialize(&CustomerServiceUpdate::SELECTOR).unwrap();
    request.extend(serialize(&("not an id", customer(8))).unwrap());
    client.write_all(&request).unwrap();

    let mut ctx = context(&client);
    let id = CustomerServiceClient::add(&mut ctx, customer(8))
        .flatten_invoke()
        .unwrap();
    assert_eq!(
        CustomerServiceClient::get(&mut ctx, id).flatten_invoke(),
        Ok(customer(8))
    );

    let (store, res) = service.stop().unwrap();
    assert!(res.is_ok());
    assert_eq!(store.customers.len(), 1);
}

#[test]
fn test_client_side_io_error() {
    let (client, service) = start();
    let mut ctx = context(&client);

    let id = CustomerServiceClient::add(&mut ctx, customer(4))
        .flatten_invoke()
        .unwrap();

    let (_, res) = service.stop().unwrap();
    assert!(res.is_ok());

    // the service released its end of the connection
    assert_eq!(
        CustomerServiceClient::get(&mut ctx, id).flatten_invoke(),
        Err(CustomerError::IoError)
    );
}

#[test]
fn test_service_ends_when_client_leaves() {
    let (client, service) = start();
    let mut ctx = context(&client);
    CustomerServiceClient::add(&mut ctx, customer(5))
        .flatten_invoke()
        .unwrap();

    drop(ctx);
    client.shutdown(Shutdown::Both).unwrap();

    let (store, res) = service.join().unwrap();
    assert!(matches!(res, Err(InvokeError::RemoteReceiveError(_))));
    assert_eq!(store.customers.len(), 1);
}

#[test]
fn test_interface_descriptors() {
    assert_eq!(CustomerServiceApi::IDENTIFIER, "io.example.CustomerService");

    let names = CustomerServiceApi::METHODS
        .iter()
        .map(|m| m.name)
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["add", "remove", "update", "get"]);

    assert_eq!(
        CustomerServiceAdd::SELECTOR,
        selector("io.example.CustomerService", "add")
    );
    assert_eq!(
        CustomerServiceApi::method(CustomerServiceGet::SELECTOR),
        Some(&CustomerServiceGet::descriptor())
    );
    assert_eq!(CustomerServiceApi::method(selector("io.example.CustomerService", "audit")), None);
}

#[test]
fn test_duplicate_interface_binding() {
    let res = DispatcherBuilder::<CustomerStore, BufferReader<'static>, BufferWriter>::new()
        .bind_interface::<CustomerServiceApi>()
        .unwrap()
        .bind_interface::<CustomerServiceApi>();

    assert!(matches!(
        res,
        Err(InvokeError::DuplicateSelector(s)) if s == CustomerServiceAdd::SELECTOR
    ));
}

#[test]
fn test_customer_wire_layout() {
    let bytes = serialize(&customer(9)).unwrap();

    // five members in declaration order, the name first
    assert_eq!(
        bytes[..4],
        [EncodingByte::Structure.to_u8(), 0x05, EncodingByte::String.to_u8(), 0x0a]
    );
    assert!(bytes.ends_with(&[EncodingByte::Binary.to_u8(), 0x04, 0x89, b'P', b'N', b'G']));
    assert_eq!(deserialize::<Customer>(&bytes).unwrap(), customer(9));

    // a reply and a two-alternative variant share their encoding
    let reply: Result<u32, CustomerError> = Ok(5);
    assert_eq!(
        serialize(&reply).unwrap(),
        serialize(&Variant2::<u32, CustomerError>::from(reply)).unwrap()
    );

    let err: Result<u32, CustomerError> = Err(CustomerError::InvalidCustomerId);
    let decoded: Variant2<u32, CustomerError> = deserialize(&serialize(&err).unwrap()).unwrap();
    assert_eq!(Result::<u32, CustomerError>::try_from(decoded), Ok(err));
}
