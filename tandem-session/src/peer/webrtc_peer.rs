use crate::config::SessionConfig;
use crate::peer::peer_connection::{PeerConnection, PeerConnector, PeerEvent};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use std::sync::Arc;
use tandem_core::{
    ConnectionState, LocalTrack, RemoteTrack, SdpType, SessionDescription, TrackKind,
};
use tokio::sync::mpsc;
use tracing::{debug, info};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8, MediaEngine};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

/// [`PeerConnector`] producing `webrtc` peer connections.
#[derive(Clone, Copy, Default)]
pub struct WebRtcConnector;

#[async_trait]
impl PeerConnector for WebRtcConnector {
    async fn connect(
        &self,
        config: &SessionConfig,
        events: mpsc::Sender<PeerEvent>,
    ) -> Result<Box<dyn PeerConnection>> {
        Ok(Box::new(WebRtcPeer::new(config, events).await?))
    }
}

pub struct WebRtcPeer {
    peer_connection: Arc<RTCPeerConnection>,
}

impl WebRtcPeer {
    /// Builds the connection and routes its callbacks into `event_tx`.
    pub async fn new(config: &SessionConfig, event_tx: mpsc::Sender<PeerEvent>) -> Result<Self> {
        // 1. Codecs for the audio and video tracks we offer and accept
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;

        // 2. Default interceptors (NACK, RTCP reports, TWCC)
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        // 3. API object owning both
        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        // 4. STUN/TURN servers and the pre-gathered candidate pool
        let rtc_config = RTCConfiguration {
            ice_servers: config
                .ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                    ..Default::default()
                })
                .collect(),
            ice_candidate_pool_size: config.ice_candidate_pool_size,
            ..Default::default()
        };

        // 5. The connection itself; callbacks below only forward into `event_tx`
        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await?);

        // A. Connection state, minus states with no session meaning
        let state_tx = event_tx.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();

                Box::pin(async move {
                    info!("Peer connection state changed: {:?}", s);
                    let Some(state) = connection_state(s) else {
                        return;
                    };
                    let _ = tx.send(PeerEvent::ConnectionState(state)).await;
                })
            },
        ));

        // B. Trickle ICE: each gathered candidate as its JSON init form.
        // `None` marks the end of gathering and is not forwarded.
        let ice_tx = event_tx.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();

            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(json_candidate) = candidate.to_json() else {
                    return;
                };
                let Ok(payload) = serde_json::to_value(&json_candidate) else {
                    return;
                };
                let _ = tx.send(PeerEvent::LocalCandidate(payload)).await;
            })
        }));

        // C. Remote media tracks announced by the other side
        let track_tx = event_tx;
        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let tx = track_tx.clone();

                Box::pin(async move {
                    let kind = match track.kind() {
                        RTPCodecType::Audio => TrackKind::Audio,
                        RTPCodecType::Video => TrackKind::Video,
                        _ => return,
                    };
                    let remote = RemoteTrack {
                        id: track.id(),
                        stream_id: track.stream_id(),
                        kind,
                    };
                    debug!("Remote track arrived: {:?}", remote);
                    let _ = tx.send(PeerEvent::RemoteTrack(remote)).await;
                })
            },
        ));

        Ok(Self { peer_connection })
    }
}

fn connection_state(state: RTCPeerConnectionState) -> Option<ConnectionState> {
    match state {
        RTCPeerConnectionState::New => Some(ConnectionState::New),
        RTCPeerConnectionState::Connecting => Some(ConnectionState::Connecting),
        RTCPeerConnectionState::Connected => Some(ConnectionState::Connected),
        RTCPeerConnectionState::Disconnected => Some(ConnectionState::Disconnected),
        RTCPeerConnectionState::Failed => Some(ConnectionState::Failed),
        RTCPeerConnectionState::Closed => Some(ConnectionState::Closed),
        _ => None,
    }
}

fn to_rtc(desc: SessionDescription) -> Result<RTCSessionDescription> {
    let rtc = match desc.kind {
        SdpType::Offer => RTCSessionDescription::offer(desc.sdp)?,
        SdpType::Answer => RTCSessionDescription::answer(desc.sdp)?,
        SdpType::Pranswer => RTCSessionDescription::pranswer(desc.sdp)?,
        SdpType::Rollback => bail!("rollback descriptions are not supported"),
    };
    Ok(rtc)
}

fn from_rtc(desc: RTCSessionDescription) -> Result<SessionDescription> {
    let kind = match desc.sdp_type {
        RTCSdpType::Offer => SdpType::Offer,
        RTCSdpType::Answer => SdpType::Answer,
        RTCSdpType::Pranswer => SdpType::Pranswer,
        RTCSdpType::Rollback => SdpType::Rollback,
        other => bail!("unusable description type {other}"),
    };
    Ok(SessionDescription {
        kind,
        sdp: desc.sdp,
    })
}

fn codec_for(kind: TrackKind) -> RTCRtpCodecCapability {
    match kind {
        TrackKind::Audio => RTCRtpCodecCapability {
            mime_type: MIME_TYPE_OPUS.to_owned(),
            clock_rate: 48000,
            channels: 2,
            ..Default::default()
        },
        TrackKind::Video => RTCRtpCodecCapability {
            mime_type: MIME_TYPE_VP8.to_owned(),
            clock_rate: 90000,
            ..Default::default()
        },
    }
}

#[async_trait]
impl PeerConnection for WebRtcPeer {
    async fn add_track(&self, track: &LocalTrack) -> Result<()> {
        let local = Arc::new(TrackLocalStaticSample::new(
            codec_for(track.kind),
            track.id.clone(),
            track.stream_id.clone(),
        ));
        let sender = self
            .peer_connection
            .add_track(local as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .with_context(|| format!("Failed to attach local track {}", track.id))?;

        // RTCP has to be read for interceptors to work.
        tokio::spawn(async move {
            let mut buf = vec![0u8; 1500];
            while sender.read(&mut buf).await.is_ok() {}
        });
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .context("Failed to create offer")?;
        from_rtc(offer)
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .context("Failed to create answer")?;
        from_rtc(answer)
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        self.peer_connection
            .set_local_description(to_rtc(desc)?)
            .await
            .context("Failed to set local description")?;
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        self.peer_connection
            .set_remote_description(to_rtc(desc)?)
            .await
            .context("Failed to set remote description")?;
        Ok(())
    }

    async fn has_remote_description(&self) -> bool {
        self.peer_connection.remote_description().await.is_some()
    }

    async fn add_remote_candidate(&self, candidate: serde_json::Value) -> Result<()> {
        let candidate: RTCIceCandidateInit =
            serde_json::from_value(candidate).context("Failed to parse ICE candidate JSON")?;
        self.peer_connection.add_ice_candidate(candidate).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.peer_connection.close().await?;
        Ok(())
    }
}
