use crate::peer::connection::TransportEvents;
use std::sync::Arc;
use tracing::{debug, info, warn};
use webrtc::data_channel::{data_channel_message::DataChannelMessage, RTCDataChannel};

/// Wires the initiator's data channel: open is reported, messages are echoed
pub fn attach_dc(dc: &Arc<RTCDataChannel>, events: TransportEvents) {
    let label = dc.label().to_string();
    dc.on_open(Box::new(move || {
        info!(label = %label, "data channel open");
        events.channel_open();
        Box::pin(async {})
    }));

    // weak so the handler does not keep its own channel alive
    let weak = Arc::downgrade(dc);
    dc.on_message(Box::new(move |msg: DataChannelMessage| {
        let weak = weak.clone();
        Box::pin(async move {
            let Some(dc) = weak.upgrade() else {
                return;
            };
            let data = String::from_utf8_lossy(&msg.data).to_string();
            debug!(label = %dc.label(), data = %data, "data channel message");
            if let Err(err) = dc.send_text(pong_reply(&data)).await {
                warn!(error = %err, "failed to answer data channel message");
            }
        })
    }));

    dc.on_close(Box::new(|| {
        debug!("data channel closed");
        Box::pin(async {})
    }));
}

/// Reply sent for every message received on the data channel
pub fn pong_reply(data: &str) -> String {
    format!("pong {data}")
}
