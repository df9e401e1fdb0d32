mod notifications;
mod pipeline;
