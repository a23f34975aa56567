use crate::error::TransportError;
use crate::peer::types::IceCandidate;
use tracing::{debug, info, warn};
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;

/// Converts an engine candidate into its wire form
pub fn candidate_from_rtc(cand: &RTCIceCandidate) -> Result<IceCandidate, TransportError> {
    let init = cand.to_json()?;
    Ok(IceCandidate {
        candidate: init.candidate,
        sdp_mid: init.sdp_mid,
        sdp_mline_index: init.sdp_mline_index,
    })
}

/// Trace a candidate as it arrives
pub fn dump_candidate(channel_id: &str, label: &str, cand: &IceCandidate) {
    debug!(
        channel_id = %channel_id,
        candidate = %cand.candidate,
        sdp_mid = ?cand.sdp_mid,
        sdp_mline_index = ?cand.sdp_mline_index,
        "{label} ICE candidate"
    );
}

/// Candidate counts per type
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CandidateTally {
    pub host: usize,
    pub srflx: usize,
    pub relay: usize,
}

/// Counts gathered candidates by type and warns when no relay is available
pub fn analyze_candidates(channel_id: &str, candidates: &[IceCandidate]) -> CandidateTally {
    let mut tally = CandidateTally::default();

    for candidate in candidates {
        if candidate.candidate.contains("typ host") {
            tally.host += 1;
        } else if candidate.candidate.contains("typ srflx") {
            tally.srflx += 1;
        } else if candidate.candidate.contains("typ relay") {
            tally.relay += 1;
        }
    }

    info!(
        channel_id = %channel_id,
        host = tally.host,
        srflx = tally.srflx,
        relay = tally.relay,
        "candidate analysis"
    );

    if tally.relay == 0 {
        warn!(channel_id = %channel_id, "no TURN relay candidates gathered, NAT traversal may fail");
    }
    tally
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(s: &str) -> IceCandidate {
        IceCandidate {
            candidate: s.into(),
            sdp_mid: Some("0".into()),
            sdp_mline_index: Some(0),
        }
    }

    #[test]
    fn tally_counts_each_type() {
        let candidates = [
            cand("candidate:1 1 udp 2122260223 192.168.1.4 51234 typ host generation 0"),
            cand("candidate:2 1 udp 2122260223 10.0.0.7 51235 typ host generation 0"),
            cand("candidate:3 1 udp 1686052607 203.0.113.9 51234 typ srflx raddr 192.168.1.4 rport 51234"),
            cand("candidate:4 1 udp 41885439 198.51.100.2 3478 typ relay raddr 203.0.113.9 rport 51234"),
            cand("garbage"),
        ];
        assert_eq!(
            analyze_candidates("abc", &candidates),
            CandidateTally {
                host: 2,
                srflx: 1,
                relay: 1
            }
        );
    }

    #[test]
    fn empty_gathering_tallies_to_zero() {
        assert_eq!(analyze_candidates("abc", &[]), CandidateTally::default());
    }
}
