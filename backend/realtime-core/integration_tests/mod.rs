mod activation;
mod api_client;
mod connection;
mod context;
mod helpers;
