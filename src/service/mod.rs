pub mod tso;
