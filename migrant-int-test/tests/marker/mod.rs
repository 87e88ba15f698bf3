mod marker_test;
