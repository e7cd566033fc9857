use std::error::Error;

use protium::codegen;
use protium::schema::{Enum, Field, Root, ScalarType, Type, TypeId};
use protium::util::Hex;
use protium::{CodecMode, Message, Value};
use tracing_subscriber::EnvFilter;

fn schema() -> Result<(Root, TypeId), Box<dyn Error>> {
    let mut root = Root::new();

    let mut status = Enum::new("shop.Status");
    status
        .add_value("PENDING", 0)?
        .add_value("SHIPPED", 1)?
        .add_value("CANCELLED", 2)?;
    root.add_enum(status)?;

    let mut line = Type::new("shop.Order.Line");
    line.add_field(Field::new("sku", 1, "string").required())?
        .add_field(Field::new("quantity", 2, "uint32").with_default(1u32))?
        .add_field(Field::new("cents", 3, "sfixed64"))?;
    root.add_type(line)?;

    let mut order = Type::new("shop.Order");
    order
        .add_field(Field::new("id", 1, "uint64").required())?
        .add_field(Field::new("status", 2, "Status"))?
        .add_field(Field::new("lines", 3, "Line").repeated())?
        .add_field(Field::new("coupons", 4, "sint32").repeated().packed(true))?
        .add_field(Field::new("notes", 5, "string").map(ScalarType::String))?
        .add_field(Field::new("parent", 6, "Order"))?;
    let order = root.add_type(order)?;

    let pending = root.resolve();
    if pending != 0 {
        return Err(format!("unresolved references: {:?}", root.unresolved()).into());
    }
    Ok((root, order))
}

fn sample() -> Message {
    let line = |sku: &str, quantity: u32, cents: i64| {
        Message::new().with(1, sku).with(2, quantity).with(3, cents)
    };
    let notes = [("gift", "yes"), ("door", "back")]
        .into_iter()
        .map(|(k, v)| (k.into(), Value::from(v)))
        .collect();
    Message::new()
        .with(1, 4_294_967_296u64)
        .with(2, Value::Enum(1))
        .with(3, vec![Value::from(line("A-1", 1, 1999)), Value::from(line("B-7", 3, -250))])
        .with(4, vec![Value::I32(-1), Value::I32(150)])
        .with(5, Value::Map(notes))
        .with(6, Message::new().with(1, 7u64))
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut verbose = false;
    let mut mode = CodecMode::Compiled;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--verbose" => verbose = true,
            "--reflective" => mode = CodecMode::Reflective,
            other => return Err(format!("unrecognized argument `{other}`").into()),
        }
    }
    codegen::set_verbose(verbose);

    let (mut root, order) = schema()?;
    root.set_mode(mode);
    let codec = root.codec(order);

    if verbose {
        for listing in codec.listings()? {
            println!("{listing}\n");
        }
    }

    let msg = sample();
    codec.verify(&msg)?;
    let bytes = codec.encode(&msg)?;
    println!("mode:    {:?} (synthesis supported: {})", mode, codegen::supported());
    println!("encoded: {} bytes", bytes.len());
    println!("hex:     {}", Hex(&bytes));

    let back = codec.decode(&bytes)?;
    println!("equivalent after decode: {}", back.equivalent(&root, order, &msg));

    let broken = Message::new().with(3, vec![Value::from(Message::new())]);
    if let Err(err) = codec.verify(&broken) {
        println!("verify:  {err}");
    }
    Ok(())
}
