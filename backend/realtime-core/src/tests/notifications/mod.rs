mod feed;
mod store;
