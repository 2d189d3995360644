//! Loopback verification scenarios: a full C-ECHO exchange with a
//! graceful release, and association rejection paths.

use dcm_ul::association::server::AccessControl;
use dcm_ul::association::{
    ClientAssociationOptions, Error as AssociationError, ServerAssociationOptions,
};
use dcm_ul::echo::{echo, EchoServer};
use dcm_ul::pdu::{
    AssociationRJResult, AssociationRJServiceUserReason, AssociationRJSource,
    PresentationContextResultReason,
};
use matches::assert_matches;
use std::net::TcpListener;
use std::time::Duration;

const VERIFICATION: &str = "1.2.840.10008.1.1";
const IMPLICIT_VR_LE: &str = "1.2.840.10008.1.2";

fn wait_for_idle<A, H>(server: &EchoServer<A, H>)
where
    A: AccessControl + Clone + Send + Sync + 'static,
    H: dcm_ul::echo::EchoHandler + 'static,
{
    for _ in 0..100 {
        if server.active_associations() == 0 {
            return;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    panic!("server did not become idle");
}

#[test]
fn echo_success_and_graceful_release() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = EchoServer::new(ServerAssociationOptions::new().ae_title("ECHO-SCP"));
    let server_handle = server.clone();
    std::thread::spawn(move || {
        let _ = server_handle.serve(listener);
    });

    let mut association = ClientAssociationOptions::new()
        .calling_ae_title("ECHO-SCU")
        .called_ae_title("ECHO-SCP")
        .with_abstract_syntax(VERIFICATION)
        .with_transfer_syntax(IMPLICIT_VR_LE)
        .establish(addr)
        .unwrap();

    // the offered context was accepted with the offered transfer syntax
    let contexts = association.presentation_contexts();
    assert_eq!(contexts.len(), 1);
    assert_eq!(contexts[0].id, 1);
    assert_eq!(contexts[0].abstract_syntax, VERIFICATION);
    assert_eq!(contexts[0].transfer_syntax, IMPLICIT_VR_LE);
    assert_eq!(
        contexts[0].reason,
        PresentationContextResultReason::Acceptance
    );

    let status = echo(&mut association).unwrap();
    assert_eq!(status, 0x0000);

    // message identifiers increase across requests
    let status = echo(&mut association).unwrap();
    assert_eq!(status, 0x0000);

    association.release().unwrap();
    wait_for_idle(&server);
    assert_eq!(server.active_associations(), 0);
}

#[test]
fn custom_handler_status_is_propagated() {
    struct Unsupported;
    impl dcm_ul::echo::EchoHandler for Unsupported {
        fn on_c_echo(&self, _request: &dcm_ul::echo::EchoRequest) -> u16 {
            0x0122
        }
    }

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let server = EchoServer::with_handler(
        ServerAssociationOptions::new().ae_title("ECHO-SCP"),
        Unsupported,
    );
    let server_handle = server.clone();
    std::thread::spawn(move || {
        let _ = server_handle.serve(listener);
    });

    let mut association = ClientAssociationOptions::new()
        .called_ae_title("ECHO-SCP")
        .with_abstract_syntax(VERIFICATION)
        .establish(addr)
        .unwrap();
    let status = echo(&mut association).unwrap();
    assert_eq!(status, 0x0122);
    association.release().unwrap();
}

#[test]
fn called_ae_title_mismatch_is_rejected() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = EchoServer::new(
        ServerAssociationOptions::new()
            .accept_called_ae_title()
            .ae_title("REAL-SCP"),
    );
    let server_handle = server.clone();
    std::thread::spawn(move || {
        let _ = server_handle.serve(listener);
    });

    let result = ClientAssociationOptions::new()
        .called_ae_title("WRONG-SCP")
        .with_abstract_syntax(VERIFICATION)
        .establish(addr);

    match result {
        Err(AssociationError::Rejected { association_rj, .. }) => {
            assert_eq!(association_rj.result, AssociationRJResult::Permanent);
            assert_eq!(
                association_rj.source,
                AssociationRJSource::ServiceUser(
                    AssociationRJServiceUserReason::CalledAETitleNotRecognized
                )
            );
        }
        other => panic!("expected rejection, got {:?}", other.map(|_| ())),
    }
    wait_for_idle(&server);
}

#[test]
fn unknown_calling_ae_title_is_rejected() {
    // an access control policy which only trusts one calling node
    #[derive(Debug, Clone)]
    struct TrustedCallersOnly;
    impl AccessControl for TrustedCallersOnly {
        fn check_access(
            &self,
            _this_ae_title: &str,
            calling_ae_title: &str,
            _called_ae_title: &str,
        ) -> Result<(), AssociationRJServiceUserReason> {
            if calling_ae_title == "TRUSTED-SCU" {
                Ok(())
            } else {
                Err(AssociationRJServiceUserReason::CallingAETitleNotRecognized)
            }
        }
    }

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let server = EchoServer::new(
        ServerAssociationOptions::new().ae_access_control(TrustedCallersOnly),
    );
    let server_handle = server.clone();
    std::thread::spawn(move || {
        let _ = server_handle.serve(listener);
    });

    // the trusted caller is admitted
    let mut association = ClientAssociationOptions::new()
        .calling_ae_title("TRUSTED-SCU")
        .with_abstract_syntax(VERIFICATION)
        .establish(addr)
        .unwrap();
    association.release().unwrap();

    // anyone else is turned away before any data is exchanged
    let result = ClientAssociationOptions::new()
        .calling_ae_title("UNKNOWN")
        .with_abstract_syntax(VERIFICATION)
        .establish(addr);
    assert_matches!(
        result,
        Err(AssociationError::Rejected { association_rj, .. })
        if association_rj.source == AssociationRJSource::ServiceUser(
            AssociationRJServiceUserReason::CallingAETitleNotRecognized
        )
    );
    wait_for_idle(&server);
}

#[test]
fn unsupported_abstract_syntax_yields_no_accepted_contexts() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let server = EchoServer::new(ServerAssociationOptions::new());
    let server_handle = server.clone();
    std::thread::spawn(move || {
        let _ = server_handle.serve(listener);
    });

    // propose a context the verification provider does not serve
    let result = ClientAssociationOptions::new()
        .with_abstract_syntax("1.2.840.10008.5.1.4.1.1.7")
        .establish(addr);
    assert_matches!(
        result,
        Err(AssociationError::NoAcceptedPresentationContexts { .. })
    );
    wait_for_idle(&server);
}
