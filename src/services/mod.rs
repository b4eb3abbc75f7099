pub mod order_sink;
